mod middleware;
mod password;
pub mod session;

pub use middleware::{AuthRejection, RequestContext, RequireAdmin, RequireSignedIn, Viewer};
pub use password::{MIN_PASSWORD_LEN, PasswordManager};
pub use session::{Flash, FlashLevel, SessionData, SessionHandle, session_layer};
