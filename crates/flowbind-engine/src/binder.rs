//! Binder plugins: attach deployed modules to the message bus.
//!
//! A plugin declares the module types it handles through
//! [`BinderPlugin::supported_types`]; modules of any other type are left to
//! other plugins and are neither bound nor an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowbind_types::{DescriptorKey, ModuleType};

use crate::bus::{BindingHandle, MessageBus, Publisher, Subscription};
use crate::deployment::DeployedModule;
use crate::error::BindError;

/// Module types bound by [`StreamBinderPlugin`].
pub const STREAM_MODULE_TYPES: [ModuleType; 3] =
    [ModuleType::Source, ModuleType::Processor, ModuleType::Sink];

/// Bus endpoints handed to a module after binding.
#[derive(Debug)]
pub struct BoundModule {
    /// Frames arriving on the module's input channel.
    pub input: Option<Subscription>,
    /// Where the module publishes its output.
    pub output: Option<Publisher>,
}

#[async_trait]
pub trait BinderPlugin: Send + Sync {
    fn supported_types(&self) -> &[ModuleType];

    fn supports(&self, module: &DeployedModule) -> bool {
        self.supported_types().contains(&module.module_type())
    }

    fn input_channel_name<'m>(&self, module: &'m DeployedModule) -> Option<&'m str>;

    fn output_channel_name<'m>(&self, module: &'m DeployedModule) -> Option<&'m str>;

    /// Bind `module`. Returns `Ok(None)` without touching the bus when the
    /// module's type is not supported.
    async fn bind(&self, module: &DeployedModule) -> Result<Option<BoundModule>, BindError>;

    /// Release what [`bind`](Self::bind) acquired for `module`.
    async fn unbind(&self, module: &DeployedModule) -> Result<(), BindError>;
}

#[derive(Debug, Default)]
struct ModuleBindings {
    consumer: Option<BindingHandle>,
    producer: Option<BindingHandle>,
}

/// Binds source, processor and sink modules using the channel names stored in
/// their deployment metadata.
///
/// Each instance may be bound once; a second `bind` before `unbind` fails.
/// Different instances can be bound concurrently and in any order.
pub struct StreamBinderPlugin {
    bus: Arc<dyn MessageBus>,
    bindings: Mutex<HashMap<DescriptorKey, ModuleBindings>>,
}

impl StreamBinderPlugin {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `module` currently holds bindings.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::LockPoisoned`] if the binding table is poisoned.
    pub fn is_bound(&self, module: &DeployedModule) -> Result<bool, BindError> {
        let bindings = self.bindings.lock().map_err(|_| BindError::LockPoisoned)?;
        Ok(bindings.contains_key(module.key()))
    }

    /// Keys of every bound instance, in rank order.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::LockPoisoned`] if the binding table is poisoned.
    pub fn bound_keys(&self) -> Result<Vec<DescriptorKey>, BindError> {
        let bindings = self.bindings.lock().map_err(|_| BindError::LockPoisoned)?;
        let mut keys: Vec<DescriptorKey> = bindings.keys().cloned().collect();
        keys.sort_by(|a, b| a.rank_cmp(b).then_with(|| a.stream().cmp(b.stream())));
        Ok(keys)
    }

    async fn bind_ports(
        &self,
        module: &DeployedModule,
    ) -> Result<(ModuleBindings, BoundModule), BindError> {
        let consumer = match self.input_channel_name(module) {
            Some(channel) => Some(self.bus.bind_consumer(channel).await?),
            None => None,
        };

        let producer = match self.output_channel_name(module) {
            Some(channel) => match self.bus.bind_producer(channel).await {
                Ok(binding) => Some(binding),
                Err(err) => {
                    if let Some(consumer) = consumer {
                        if let Err(rollback) = self.bus.unbind(&consumer.handle).await {
                            tracing::warn!(
                                module = %module.key(),
                                error = %rollback,
                                "Failed to release input binding after output bind failure"
                            );
                        }
                    }
                    return Err(err.into());
                }
            },
            None => None,
        };

        let (consumer_handle, input) = consumer.map_or((None, None), |c| (Some(c.handle), Some(c.subscription)));
        let (producer_handle, output) = producer.map_or((None, None), |p| (Some(p.handle), Some(p.publisher)));

        Ok((
            ModuleBindings {
                consumer: consumer_handle,
                producer: producer_handle,
            },
            BoundModule { input, output },
        ))
    }
}

#[async_trait]
impl BinderPlugin for StreamBinderPlugin {
    fn supported_types(&self) -> &[ModuleType] {
        &STREAM_MODULE_TYPES
    }

    fn input_channel_name<'m>(&self, module: &'m DeployedModule) -> Option<&'m str> {
        module.metadata().input_channel_name()
    }

    fn output_channel_name<'m>(&self, module: &'m DeployedModule) -> Option<&'m str> {
        module.metadata().output_channel_name()
    }

    async fn bind(&self, module: &DeployedModule) -> Result<Option<BoundModule>, BindError> {
        if !self.supports(module) {
            tracing::debug!(
                module = %module.descriptor(),
                "Module type not handled by stream binder"
            );
            return Ok(None);
        }

        // Reserve the slot first so a concurrent second bind cannot slip in.
        {
            let mut bindings = self.bindings.lock().map_err(|_| BindError::LockPoisoned)?;
            if bindings.contains_key(module.key()) {
                return Err(BindError::AlreadyBound(module.key().clone()));
            }
            bindings.insert(module.key().clone(), ModuleBindings::default());
        }

        match self.bind_ports(module).await {
            Ok((handles, bound)) => {
                let mut bindings = self.bindings.lock().map_err(|_| BindError::LockPoisoned)?;
                bindings.insert(module.key().clone(), handles);
                tracing::info!(
                    module = %module.key(),
                    input = ?module.metadata().input_channel_name(),
                    output = ?module.metadata().output_channel_name(),
                    "Bound module"
                );
                Ok(Some(bound))
            }
            Err(err) => {
                let mut bindings = self.bindings.lock().map_err(|_| BindError::LockPoisoned)?;
                bindings.remove(module.key());
                Err(err)
            }
        }
    }

    async fn unbind(&self, module: &DeployedModule) -> Result<(), BindError> {
        if !self.supports(module) {
            return Ok(());
        }

        let handles = {
            let mut bindings = self.bindings.lock().map_err(|_| BindError::LockPoisoned)?;
            bindings
                .remove(module.key())
                .ok_or_else(|| BindError::NotBound(module.key().clone()))?
        };

        // Release both sides even if the first fails; report the first error.
        let mut first_error = None;
        for handle in [handles.producer, handles.consumer].into_iter().flatten() {
            if let Err(err) = self.bus.unbind(&handle).await {
                tracing::warn!(module = %module.key(), binding = %handle, error = %err, "Unbind failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => {
                tracing::info!(module = %module.key(), "Unbound module");
                Ok(())
            }
        }
    }
}
