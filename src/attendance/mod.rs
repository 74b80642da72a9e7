pub mod calendar;
pub mod finalizer;
pub mod geofence;
pub mod leave_oracle;
pub mod locks;
pub mod punch;
pub mod scheduler;
pub mod service;
pub mod session_tracker;
pub mod shift_registry;
pub mod status_resolver;

#[cfg(test)]
pub(crate) mod testing;
