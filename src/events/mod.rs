pub mod lifecycle;
pub mod registration;

pub use lifecycle::{
    cancel, confirm, now_in_guild_tz, run_close_procedure, run_delete_procedure, run_reminder_procedure,
    within_close_window, AttendanceCollaborator, CloseOutcome,
};
pub use registration::{apply_reaction_add, apply_reaction_remove, EventLocks, HintMap, MarkerSet};
