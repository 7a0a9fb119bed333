mod authority;
mod clock;
mod repository;
mod timer;

pub use authority::GrantAuthority;
pub use clock::Clock;
pub use repository::GrantRepository;
pub use timer::{TimerHandle, TimerHost, TimerTask};
