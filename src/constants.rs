/// Maximum simultaneous workers on one mineral patch.
pub const MINERAL_PATCH_CAPACITY: usize = 2;

/// Maximum simultaneous workers on one refinery.
pub const REFINERY_CAPACITY: usize = 3;

/// Distance at which a worker counts as "at" its base for node selection,
/// and within which an assigned worker counts toward the active totals.
pub const BASE_PROXIMITY: i32 = 200;

/// Workers further than this from an assigned refinery are re-routed via
/// their base instead of being given a gather order directly.
pub const REFINERY_GATHER_RANGE: i32 = 500;

/// The order timer only tracks workers within this distance of their patch.
pub const ORDER_TIMER_TRACK_RANGE: i32 = 100;

/// Frames the simulation engine waits before acting on a gather order.
/// The optimal resend point precedes arrival by this plus command latency.
pub const ORDER_RESEND_WINDOW: i32 = 11;

/// Offset of a mining unit's order timer relative to the resend window.
pub const ORDER_TIMER_OFFSET: i32 = 7;

/// History samples recorded more than this many frames after the computed
/// optimal frame are pruned from the learned set. A command one frame late
/// still works; one frame early does not.
pub const HISTORY_LATE_TOLERANCE: i32 = 2;

/// Number of worker/patch pairs the frame-0 bootstrap assigns.
pub const INITIAL_MINERAL_WORKERS: usize = 4;

/// A worker this close to its patch is no longer "on approach".
pub const NEAR_PATCH_DISTANCE: i32 = 20;

/// A command older than this many frames is considered stale when deciding
/// whether to pre-empt the order timer's resend.
pub const STALE_COMMAND_FRAMES: i32 = 20;
