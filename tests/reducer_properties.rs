//! Property-based tests for the store reducer

use proptest::prelude::*;
use shelfsync::client::store::{reduce, Action, ProductsState};
use shelfsync::shared::product::Product;
use std::collections::HashMap;

fn product(id: &str, name: &str) -> Product {
    Product {
        id: Some(id.to_string()),
        name: name.to_string(),
        ..Default::default()
    }
}

/// (use AddSucceeded?, id, name)
fn arb_merges() -> impl Strategy<Value = Vec<(bool, String, String)>> {
    prop::collection::vec((any::<bool>(), "[a-d]", "[a-z]{1,6}"), 0..40)
}

proptest! {
    /// Any sequence of confirmed adds/updates sharing ids leaves exactly one
    /// entry per id, holding the most recently applied payload.
    #[test]
    fn merge_keeps_one_entry_per_id(ops in arb_merges()) {
        let mut state = ProductsState::default();
        let mut last_name: HashMap<String, String> = HashMap::new();

        for (is_add, id, name) in &ops {
            let record = product(id, name);
            let action = if *is_add {
                Action::AddSucceeded { product: record, replaces: None }
            } else {
                Action::UpdateSucceeded { product: record }
            };
            state = reduce(&state, &action);
            last_name.insert(id.clone(), name.clone());
        }

        prop_assert_eq!(state.products.len(), last_name.len());
        for entry in &state.products {
            let id = entry.id.as_deref().unwrap();
            prop_assert_eq!(&entry.name, &last_name[id]);
        }
    }

    /// Applying the same confirmed payload twice changes nothing.
    #[test]
    fn merge_is_idempotent(ops in arb_merges(), dup in "[a-d]") {
        let mut state = ProductsState::default();
        for (_, id, name) in &ops {
            state = reduce(&state, &Action::UpdateSucceeded { product: product(id, name) });
        }
        let action = Action::AddSucceeded { product: product(&dup, "fixed"), replaces: None };
        let once = reduce(&state, &action);
        let twice = reduce(&once, &action);
        prop_assert_eq!(once.products, twice.products);
    }

    /// Deleting an id that is not in the collection is a no-op.
    #[test]
    fn delete_absent_id_is_noop(ops in arb_merges()) {
        let mut state = ProductsState::default();
        for (_, id, name) in &ops {
            state = reduce(&state, &Action::UpdateSucceeded { product: product(id, name) });
        }
        let after = reduce(&state, &Action::DeleteSucceeded { id: "never-used".to_string() });
        prop_assert_eq!(after.products, state.products);
    }

    /// Delete then re-add round-trips to a collection containing the id once.
    #[test]
    fn delete_then_add_restores_single_entry(id in "[a-d]", name in "[a-z]{1,6}") {
        let state = reduce(
            &ProductsState::default(),
            &Action::AddSucceeded { product: product(&id, &name), replaces: None },
        );
        let state = reduce(&state, &Action::DeleteSucceeded { id: id.clone() });
        prop_assert!(state.products.is_empty());
        let state = reduce(
            &state,
            &Action::AddSucceeded { product: product(&id, &name), replaces: None },
        );
        prop_assert_eq!(state.products.len(), 1);
    }
}
