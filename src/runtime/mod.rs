//Runtime: drives the balancer core in real time.
//Monotonic clock + drift-corrected tick loop, the bounded input channel feeding it,
//and the telemetry sinks it publishes to once per tick.

pub mod clock;
pub mod input;
pub mod telemetry;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SpinClock};
pub use input::{input_channel, InputHandle, InputQueue};
pub use scheduler::{Scheduler, SchedulerPhase};
pub use telemetry::{TelemetryError, TelemetrySink, TelemetrySnapshot};
