use std::cmp::Ordering;

use flowbind_types::{DescriptorKey, ModuleDescriptor, ModuleDescriptorBuilder, ModuleType};
use proptest::prelude::*;

fn module_type() -> impl Strategy<Value = ModuleType> {
    prop::sample::select(ModuleType::ALL.to_vec())
}

fn build_stage(name: &str, index: usize) -> ModuleDescriptor {
    ModuleDescriptor::builder()
        .module_name(name)
        .group("prop")
        .module_type(ModuleType::Processor)
        .index(index)
        .build()
        .expect("valid stage")
}

proptest! {
    #[test]
    fn sorting_yields_ascending_indices(order in Just((0_usize..12).collect::<Vec<_>>()).prop_shuffle()) {
        let mut stages: Vec<ModuleDescriptor> =
            order.iter().map(|&i| build_stage("m", i)).collect();
        stages.sort_by(ModuleDescriptor::cmp_by_index);
        let indices: Vec<usize> = stages.iter().map(ModuleDescriptor::index).collect();
        prop_assert_eq!(indices, (0..order.len()).collect::<Vec<_>>());
    }

    #[test]
    fn default_label_is_name_dash_index(name in "[a-z][a-z0-9_]{0,15}", index in 0_usize..1000) {
        let mut builder = ModuleDescriptor::builder().module_name(name.clone()).index(index);
        let expected = format!("{name}-{index}");
        prop_assert_eq!(builder.label(), Some(expected.as_str()));
        let stage = build_stage(&name, index);
        prop_assert_eq!(stage.module_label(), expected.as_str());
    }

    #[test]
    fn copy_then_build_is_identity(
        name in "[a-z]{1,8}",
        index in 0_usize..50,
        module_type in module_type(),
        params in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..5),
        source in prop::option::of("[a-z.:]{1,12}"),
    ) {
        let mut builder = ModuleDescriptor::builder()
            .module_name(name)
            .group("prop")
            .module_type(module_type)
            .index(index)
            .parameters(params);
        if let Some(source) = source {
            builder = builder.source_channel_name(source);
        }
        let original = builder.build().expect("valid descriptor");
        let copy = ModuleDescriptorBuilder::from_descriptor(&original).build().expect("valid copy");
        prop_assert_eq!(copy, original);
    }

    #[test]
    fn keys_differing_only_in_stream_rank_equal(
        a in "[a-z]{1,8}",
        b in "[a-z]{1,8}",
        module_type in module_type(),
        label in "[a-z]{1,8}",
    ) {
        let ka = DescriptorKey::new(a.clone(), module_type, label.clone()).unwrap();
        let kb = DescriptorKey::new(b.clone(), module_type, label).unwrap();
        prop_assert_eq!(ka.rank_cmp(&kb), Ordering::Equal);
        prop_assert_eq!(ka == kb, a == b);
    }
}
