use crate::{Entity, EntityMapping, Result};
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

static MAPPINGS: LazyLock<RwLock<HashMap<TypeId, Arc<EntityMapping>>>> =
    LazyLock::new(Default::default);

/// Mapping of `E`, reflected on first use and shared afterwards.
///
/// Invalid metadata is not cached, every call reports the same `Mapping`
/// error again.
pub fn entity_mapping<E: Entity>() -> Result<Arc<EntityMapping>> {
    let id = TypeId::of::<E>();
    if let Some(mapping) = MAPPINGS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return Ok(mapping.clone());
    }
    let mapping = Arc::new(EntityMapping::reflect(E::tags())?);
    log::debug!(
        "Reflected entity `{}` as table {} {} with {} columns",
        mapping.entity,
        mapping.table,
        mapping.alias,
        mapping.columns.len()
    );
    Ok(MAPPINGS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(id)
        .or_insert(mapping)
        .clone())
}

/// Reflect `E` now so that bad annotations fail at startup instead of on the
/// first query.
pub fn register<E: Entity>() -> Result<()> {
    entity_mapping::<E>().map(|_| ())
}
