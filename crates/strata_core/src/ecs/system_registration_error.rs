use thiserror::Error;

/// Errors that can occur while registering a system with the world.
#[derive(Debug, Error)]
pub enum SystemRegistrationError {
    #[error("system '{name}' does not access any components")]
    EmptyAccess { name: String },

    #[error("system '{name}' names component {component} more than once")]
    AliasedComponent {
        name: String,
        component: &'static str,
    },
}
