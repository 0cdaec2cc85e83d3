//! Property-based tests for workflow versions, binding uniqueness and
//! assignment reuse

use proptest::prelude::*;
use reinhardt_backoffice_core::Context;
use reinhardt_backoffice_workflow::translation::AssignmentRepository;
use reinhardt_backoffice_workflow::{
	BindingStatus, InMemoryAssignmentRepository, InMemoryBindingRepository,
	InMemoryWorkflowRepository, MissingTranslations, PersistedWorkflow, TranslationAssignment,
	TranslationQueueHook, TranslationSource, WorkflowBinding, WorkflowBindingRepository,
	WorkflowDefinition, WorkflowService, WorkflowUpdate,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

fn definition(state: &str) -> WorkflowDefinition {
	WorkflowDefinition::new("draft").with_transition("move", "draft", state)
}

proptest! {
	#[test]
	fn prop_updates_yield_consecutive_versions(states in proptest::collection::vec("[a-z]{1,8}", 1..8)) {
		let rt = tokio::runtime::Runtime::new().unwrap();

		// Arrange & Act
		let versions = rt.block_on(async {
			let ctx = Context::new();
			let service = WorkflowService::new(
				Arc::new(InMemoryWorkflowRepository::new()),
				Arc::new(InMemoryBindingRepository::new()),
			);
			let mut versions = vec![
				service
					.create_workflow(&ctx, PersistedWorkflow::new("w", "w", definition("start")))
					.await
					.unwrap()
					.version,
			];
			for state in &states {
				let expected = *versions.last().unwrap();
				let saved = service
					.update_workflow(&ctx, "w", WorkflowUpdate::new(expected).with_definition(definition(state)))
					.await
					.unwrap();
				versions.push(saved.version);
			}
			versions
		});

		// Assert
		let expected: Vec<u64> = (1..=states.len() as u64 + 1).collect();
		prop_assert_eq!(versions, expected);
	}

	#[test]
	fn prop_rollback_always_moves_forward(
		states in proptest::collection::vec("[a-z]{1,8}", 1..6),
		pick in 0usize..6,
	) {
		let rt = tokio::runtime::Runtime::new().unwrap();

		// Arrange & Act
		let (target, restored, current) = rt.block_on(async {
			let ctx = Context::new();
			let service = WorkflowService::new(
				Arc::new(InMemoryWorkflowRepository::new()),
				Arc::new(InMemoryBindingRepository::new()),
			);
			service
				.create_workflow(&ctx, PersistedWorkflow::new("w", "w", definition("start")))
				.await
				.unwrap();
			for (idx, state) in states.iter().enumerate() {
				service
					.update_workflow(&ctx, "w", WorkflowUpdate::new(idx as u64 + 1).with_definition(definition(state)))
					.await
					.unwrap();
			}
			let current = states.len() as u64 + 1;
			let target = (pick as u64 % current) + 1;
			let restored = service
				.update_workflow(&ctx, "w", WorkflowUpdate::new(current).rollback_to(target))
				.await
				.unwrap();
			(target, restored, current)
		});

		// Assert
		let expected_state = if target == 1 {
			"start".to_string()
		} else {
			states[target as usize - 2].clone()
		};
		prop_assert_eq!(restored.version, current + 1);
		prop_assert_eq!(restored.definition, definition(&expected_state));
	}

	#[test]
	fn prop_active_binding_keys_stay_unique(
		specs in proptest::collection::vec(("[ab]", 0i32..3, any::<bool>(), any::<bool>()), 1..20),
	) {
		let rt = tokio::runtime::Runtime::new().unwrap();

		// Arrange & Act
		let active = rt.block_on(async {
			let repo = InMemoryBindingRepository::new();
			for (scope_ref, priority, staged, active) in &specs {
				let mut binding = WorkflowBinding::for_trait(scope_ref, "w").with_priority(*priority);
				if *staged {
					binding = binding.with_environment("staging");
				}
				if !*active {
					binding = binding.with_status(BindingStatus::Inactive);
				}
				// Conflicts are expected; only the surviving state matters.
				let _ = repo.create(binding).await;
			}
			repo.list().await.unwrap()
		});

		// Assert
		let mut keys = HashSet::new();
		for binding in active.iter().filter(|b| b.is_active()) {
			prop_assert!(keys.insert(binding.key()));
		}
	}

	#[test]
	fn prop_queue_counts_match_existing_assignments(
		missing in proptest::collection::btree_set("[a-e]{2}", 1..6),
		existing in proptest::collection::btree_set("[a-e]{2}", 0..6),
	) {
		let rt = tokio::runtime::Runtime::new().unwrap();

		// Arrange & Act
		let (first, second) = rt.block_on(async {
			let ctx = Context::new();
			let repo = Arc::new(InMemoryAssignmentRepository::new());
			for locale in &existing {
				repo.create_or_reuse_active(TranslationAssignment::candidate("tg", "article", "a1", "zz", locale))
					.await
					.unwrap();
			}
			let hook = TranslationQueueHook::new(repo.clone());
			let blocker = MissingTranslations {
				missing_locales: missing.iter().cloned().collect(),
				entity_type: "article".into(),
				policy_entity: "article".into(),
				entity_id: "a1".into(),
				transition: "publish".into(),
				environment: "default".into(),
				requested_locale: None,
				missing_fields_by_locale: BTreeMap::new(),
			};
			let source = TranslationSource::new("zz").with_group("tg");
			let first = hook.handle(&ctx, &blocker, &source).await;
			let second = hook.handle(&ctx, &blocker, &source).await;
			(first, second)
		});

		// Assert
		let reused = missing.intersection(&existing).count();
		prop_assert_eq!(first.created, missing.len() - reused);
		prop_assert_eq!(first.reused, reused);
		prop_assert_eq!(second.created, 0);
		prop_assert_eq!(second.reused, missing.len());
	}
}
