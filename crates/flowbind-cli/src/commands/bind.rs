use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use flowbind_engine::{
    resolve_channels, BinderPlugin, DeployedModule, LocalMessageBus, StreamBinderPlugin,
};

/// Execute the `bind` command: bind every module on a local bus, report the
/// result, and release the bindings again.
pub async fn execute(pipeline_path: &Path, capacity: usize) -> Result<()> {
    if capacity == 0 {
        bail!("--capacity must be at least 1");
    }

    let (definition, descriptors) = super::load(pipeline_path)?;
    let plan = resolve_channels(&definition.name, &descriptors);
    let deployments = plan.deployments();

    let bus = Arc::new(LocalMessageBus::with_capacity(capacity));
    let binder = StreamBinderPlugin::new(bus.clone());

    let (bound, skipped) = bind_all(&binder, &deployments).await?;

    println!("Pipeline '{}' bound on local bus.", definition.name);
    println!("  Modules bound:   {}", bound.len());
    println!("  Modules skipped: {skipped}");
    for channel in bus.channel_names()? {
        println!("  {:<24} {} binding(s)", channel, bus.binding_count(&channel)?);
    }

    for module in bound {
        binder
            .unbind(module)
            .await
            .with_context(|| format!("Failed to unbind {}", module.key()))?;
    }
    tracing::info!(pipeline = definition.name, "Released all bindings");
    Ok(())
}

/// Bind `deployments` in order, returning the bound modules and how many
/// were skipped. On failure everything bound so far is released first.
async fn bind_all<'d>(
    binder: &dyn BinderPlugin,
    deployments: &'d [DeployedModule],
) -> Result<(Vec<&'d DeployedModule>, usize)> {
    let mut bound = Vec::new();
    let mut skipped = 0_usize;
    for module in deployments {
        match binder.bind(module).await {
            Ok(Some(_)) => bound.push(module),
            Ok(None) => skipped += 1,
            Err(err) => {
                release(binder, &bound).await;
                return Err(err).with_context(|| format!("Failed to bind {}", module.key()));
            }
        }
    }
    Ok((bound, skipped))
}

async fn release(binder: &dyn BinderPlugin, bound: &[&DeployedModule]) {
    for module in bound.iter().rev() {
        if let Err(err) = binder.unbind(module).await {
            tracing::warn!(module = %module.key(), error = %err, "Failed to release binding");
        }
    }
}

#[cfg(test)]
mod tests {
    use flowbind_types::{ModuleDescriptor, ModuleType};

    use super::*;

    fn orders() -> Vec<ModuleDescriptor> {
        [("http", ModuleType::Source), ("log", ModuleType::Sink)]
            .into_iter()
            .enumerate()
            .map(|(index, (name, module_type))| {
                ModuleDescriptor::builder()
                    .module_name(name)
                    .group("orders")
                    .module_type(module_type)
                    .index(index)
                    .build()
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn failed_bind_releases_earlier_modules() {
        let descriptors = orders();
        let mut deployments = resolve_channels("orders", &descriptors).deployments();
        // The repeated sink fails with AlreadyBound after two successful binds.
        deployments.push(deployments[1].clone());

        let bus = Arc::new(LocalMessageBus::new());
        let binder = StreamBinderPlugin::new(bus.clone());

        let err = bind_all(&binder, &deployments).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to bind orders/sink/log-1"));
        assert!(binder.bound_keys().unwrap().is_empty());
        assert!(bus.channel_names().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bind_all_counts_skipped_modules() {
        let job = ModuleDescriptor::builder()
            .module_name("export")
            .group("nightly")
            .module_type(ModuleType::Job)
            .build()
            .unwrap();
        let jobs = [job];
        let deployments = resolve_channels("nightly", &jobs).deployments();
        let binder = StreamBinderPlugin::new(Arc::new(LocalMessageBus::new()));

        let (bound, skipped) = bind_all(&binder, &deployments).await.unwrap();
        assert!(bound.is_empty());
        assert_eq!(skipped, 1);
    }
}
