use std::collections::BTreeMap;

use fixtura_core::InstanceId;

use crate::instance::InstanceArena;

/// Instances that `pick_random` relations may choose from, by entity.
///
/// Instances join the pool once the relation pass that discovered them
/// starts, so picks only see instances that already exist.
#[derive(Debug, Clone, Default)]
pub struct KnownInstances {
    by_entity: BTreeMap<String, Vec<InstanceId>>,
}

impl KnownInstances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: &str, instance: InstanceId) {
        self.by_entity
            .entry(entity.to_string())
            .or_default()
            .push(instance);
    }

    pub fn register_all(&mut self, arena: &InstanceArena, instances: &[InstanceId]) {
        for &instance in instances {
            self.register(arena.get(instance).entity_name(), instance);
        }
    }

    pub fn instances_of(&self, entity: &str) -> &[InstanceId] {
        self.by_entity
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_entity.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_entity_in_registration_order() {
        let mut pool = KnownInstances::new();
        pool.register("company", InstanceId::new(2));
        pool.register("employee", InstanceId::new(0));
        pool.register("company", InstanceId::new(1));
        assert_eq!(
            pool.instances_of("company"),
            &[InstanceId::new(2), InstanceId::new(1)]
        );
        assert!(pool.instances_of("office").is_empty());
        assert_eq!(pool.len(), 3);
    }
}
