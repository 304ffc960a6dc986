//! Job progress core: data model, upload validation and the pure reconciler
//! that folds status observations from both channels into one job state.
mod effect;
mod msg;
mod settings;
mod state;
mod types;
mod update;
mod validate;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use settings::{ReconcileSettings, ReconnectPolicy};
pub use state::{ChannelStatus, MonitorState, MONITORING_MESSAGE, SUBMITTING_MESSAGE};
pub use types::{
    ActiveChannel, Channel, ChannelHealth, JobId, JobState, Phase, ProgressEvent, Timestamp,
    UploadProgress,
};
pub use update::update;
pub use validate::{
    validate_upload, FileInfo, UploadConstraints, UploadMetadata, ValidationError,
    DEFAULT_MAX_UPLOAD_BYTES,
};
pub use view_model::JobView;
