//! Core Components
//!
//! Infrastructure shared by the flow executor and the session manager.

pub mod scheduler;
pub mod template;
pub mod transport;

pub use scheduler::{MockScheduler, ScheduleHandle, ScheduledTask, TaskScheduler, TokioScheduler};
pub use template::{api_url, render_path};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport, TOKEN_HEADER,
};
