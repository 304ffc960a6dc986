//! Progress engine: backend transport, channel drivers and the session
//! controller that runs them against the reconciler.
mod backend;
mod config;
mod driver;
mod error;
mod observer;
mod poller;
mod push;
mod session;
mod types;
mod upload;

pub use backend::{HttpBackend, JobBackend, SubmitRequest, UploadProgressSink};
pub use config::{ConfigError, Endpoints, MonitorConfig};
pub use driver::{ChannelDriver, DriverSink};
pub use error::SessionError;
pub use observer::{JobObserver, LoggingObserver, ObserverId};
pub use poller::Poller;
pub use push::PushListener;
pub use session::JobSession;
pub use types::{parse_status_payload, StatusSnapshot, TransportError, TransportFailure};
pub use upload::{content_type_for, UploadFile};
