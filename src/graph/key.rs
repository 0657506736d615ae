// Graph keys - typed slotmap ids for graph objects
//
// Objects refer to each other by key instead of pointer. A removed slot
// bumps its version, so stale keys never alias a newer object.

/// Declare a slotmap key that prints as `<prefix>#<index>v<version>`
macro_rules! graph_key {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        slotmap::new_key_type! {
            $(#[$meta])*
            pub struct $name;
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "#{:?}"), slotmap::Key::data(self))
            }
        }
    };
}

pub(crate) use graph_key;

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    graph_key!(TestId, "test");

    #[test]
    fn test_display_names_the_object() {
        let mut map: SlotMap<TestId, u32> = SlotMap::with_key();
        let id = map.insert(1);
        assert!(id.to_string().starts_with("test#"));
    }

    #[test]
    fn test_stale_key_does_not_alias() {
        let mut map: SlotMap<TestId, u32> = SlotMap::with_key();
        let old = map.insert(1);
        map.remove(old);
        let new = map.insert(2);

        assert_ne!(old, new);
        assert_eq!(map.get(old), None);
        assert_eq!(map.get(new), Some(&2));
    }
}
