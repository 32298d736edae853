//! Engine error types.

use flowbind_types::{DescriptorError, DescriptorKey};

use crate::bus::BindingHandle;

/// Errors reported by a [`MessageBus`](crate::bus::MessageBus).
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Channel names must contain visible text.
    #[error("invalid channel name '{0}'")]
    InvalidChannelName(String),

    /// The handle was never issued by this bus or was already released.
    #[error("unknown binding {0}")]
    UnknownBinding(BindingHandle),

    /// The receiving side of the channel is gone.
    #[error("channel '{0}' is closed")]
    ChannelClosed(String),

    /// Internal channel table lock was poisoned by a panicked thread.
    #[error("message bus lock poisoned")]
    LockPoisoned,

    /// Failure inside a concrete transport.
    #[error("transport: {0}")]
    Transport(#[from] anyhow::Error),
}

/// Errors reported by binder plugins.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// `bind` called twice for the same module instance.
    #[error("module {0} is already bound")]
    AlreadyBound(DescriptorKey),

    /// `unbind` called for an instance that holds no bindings.
    #[error("module {0} is not bound")]
    NotBound(DescriptorKey),

    #[error(transparent)]
    Bus(#[from] BusError),

    /// Binding table lock was poisoned by a panicked thread.
    #[error("binder lock poisoned")]
    LockPoisoned,
}

/// Errors reported by the [`DescriptorRegistry`](crate::registry::DescriptorRegistry).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A descriptor handed in for a pipeline belongs to another group.
    #[error("module '{label}' belongs to '{found}', not '{expected}'")]
    GroupMismatch {
        expected: String,
        found: String,
        label: String,
    },

    /// Two stages of one pipeline share type and label.
    #[error("duplicate module key {0}")]
    DuplicateKey(DescriptorKey),
}

#[cfg(test)]
mod tests {
    use flowbind_types::ModuleType;

    use super::*;
    use crate::bus::BindingRole;

    #[test]
    fn unknown_binding_names_channel() {
        let handle = BindingHandle::new(7, "orders.0", BindingRole::Consumer);
        let err = BusError::UnknownBinding(handle);
        assert_eq!(err.to_string(), "unknown binding consumer #7 on 'orders.0'");
    }

    #[test]
    fn bind_error_wraps_bus_error_transparently() {
        let err = BindError::from(BusError::ChannelClosed("orders.1".into()));
        assert_eq!(err.to_string(), "channel 'orders.1' is closed");
    }

    #[test]
    fn already_bound_displays_key() {
        let key = DescriptorKey::new("orders", ModuleType::Sink, "log-2").unwrap();
        let err = BindError::AlreadyBound(key);
        assert_eq!(err.to_string(), "module orders/sink/log-2 is already bound");
    }
}
