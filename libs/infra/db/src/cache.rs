// [libs/infra/db/src/cache.rs]
/*!
 * =================================================================
 * APARATO: BOUNDED READ CACHE (ESTRATO L3)
 * RESPONSABILIDAD: ALIVIO DE LECTURA SOBRE CAMPOS NO AUTORITATIVOS
 *
 * Este cache jamas es la fuente de verdad: solo acelera lecturas de
 * campos derivados/denormalizados (p.ej. `ResourceSummary`). Toda
 * escritura pasa primero por el store y luego invalida (write-through);
 * una lectura stale solo se tolera dentro de `stale_after` antes de
 * forzar una revalidacion sincrona contra el store.
 * =================================================================
 */

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Cache acotado (bounded) por capacidad, con expulsion FIFO simple
/// cuando se excede `max_entries` — no LRU, pues el volumen de claves
/// (un registro por provider o por GPU) es pequeno y predecible.
pub struct BoundedTtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    insertion_order: Mutex<Vec<K>>,
    max_entries: usize,
    fresh_for: Duration,
    stale_after: Duration,
}

/// Resultado de una lectura del cache, distinguiendo frescura para que
/// el llamador decida si revalidar en segundo plano o sincronamente.
pub enum CacheLookup<V> {
    Fresh(V),
    Stale(V),
    Miss,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new(max_entries: usize, fresh_for: Duration, stale_after: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(max_entries)),
            insertion_order: Mutex::new(Vec::with_capacity(max_entries)),
            max_entries,
            fresh_for,
            stale_after,
        }
    }

    #[must_use]
    pub fn get(&self, key: &K) -> CacheLookup<V> {
        let entries = self.entries.lock();
        match entries.get(key) {
            None => CacheLookup::Miss,
            Some(entry) => {
                let age = entry.inserted_at.elapsed();
                if age <= self.fresh_for {
                    CacheLookup::Fresh(entry.value.clone())
                } else if age <= self.stale_after {
                    CacheLookup::Stale(entry.value.clone())
                } else {
                    CacheLookup::Miss
                }
            }
        }
    }

    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        let mut order = self.insertion_order.lock();

        if !entries.contains_key(&key) {
            if order.len() >= self.max_entries {
                if let Some(oldest) = order.first().cloned() {
                    entries.remove(&oldest);
                    order.remove(0);
                }
            }
            order.push(key.clone());
        }

        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Invalida una entrada tras una escritura confirmada en el store
    /// (write-through); la proxima lectura forzara un miss.
    pub fn invalidate(&self, key: &K) {
        self.entries.lock().remove(key);
        self.insertion_order.lock().retain(|k| k != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_returned_as_fresh() {
        let cache = BoundedTtlCache::new(4, Duration::from_secs(60), Duration::from_secs(120));
        cache.put("providers:p1", 42);
        assert!(matches!(cache.get(&"providers:p1"), CacheLookup::Fresh(42)));
    }

    #[test]
    fn invalidate_forces_a_miss() {
        let cache = BoundedTtlCache::new(4, Duration::from_secs(60), Duration::from_secs(120));
        cache.put("providers:p1", 42);
        cache.invalidate(&"providers:p1");
        assert!(matches!(cache.get(&"providers:p1"), CacheLookup::Miss));
    }

    #[test]
    fn capacity_overflow_evicts_oldest_insertion() {
        let cache = BoundedTtlCache::new(2, Duration::from_secs(60), Duration::from_secs(120));
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        assert!(matches!(cache.get(&"a"), CacheLookup::Miss));
        assert!(matches!(cache.get(&"c"), CacheLookup::Fresh(3)));
    }
}
