pub mod config;
pub mod driver;
pub mod locator;
pub mod session;
pub mod wait;

pub use config::{ConnectionOptions, LaunchOptions};
pub use driver::{Driver, ElementMark, PrintGeometry, WindowHandle};
pub use locator::{Locator, first_present};
pub use session::BrowserSession;
pub use wait::{Backoff, settle, wait_until};
