//! Integration tests for the construction pipeline
//!
//! These tests exercise the full path: registration, routing, coercion,
//! normalization, conditional spans, AI-backed steps, and tracing.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use validado_core::{
    create, handler_fn, AiHandlerError, AiHandlerParams, CoercionKind, CreateOptions,
    DiscriminatorRule, Error, FieldSpec, NormalizationKind, Predicate, ShapeRegistry, StepKind,
    TargetShape, TraceOutcome, ValidationCheck,
};

fn order_shape(class_id: &str) -> TargetShape {
    TargetShape::builder(class_id)
        .field(
            FieldSpec::builder("quantity")
                .coerce(CoercionKind::Number)
                .validate(ValidationCheck::Required)
                .build(),
        )
        .field(
            FieldSpec::builder("email")
                .normalize(NormalizationKind::Trim)
                .normalize(NormalizationKind::Lowercase)
                .validate(ValidationCheck::Required)
                .build(),
        )
        .build()
}

#[tokio::test]
async fn number_words_are_coerced() {
    let registry = ShapeRegistry::new();
    registry.register(order_shape("order"));

    let result = registry
        .create(
            "order",
            json!({"quantity": "five", "email": "a@b.c"}),
            CreateOptions::default(),
        )
        .await
        .expect("valid input");

    assert_eq!(result.instance["quantity"], json!(5));

    let coercions: Vec<_> = result
        .trace
        .entries_for_field("quantity")
        .filter(|e| e.step_kind == StepKind::Coercion)
        .collect();
    assert_eq!(coercions.len(), 1);
    assert_eq!(coercions[0].outcome, TraceOutcome::Updated);
    assert_eq!(coercions[0].value_before, json!("five"));
    assert_eq!(coercions[0].value_after, json!(5));
}

#[tokio::test]
async fn email_is_trimmed_and_lowercased() {
    let registry = ShapeRegistry::new();
    registry.register(order_shape("order"));

    let result = registry
        .create(
            "order",
            json!({"quantity": 1, "email": "  JOHN@EXAMPLE.COM  "}),
            CreateOptions::default(),
        )
        .await
        .expect("valid input");

    assert_eq!(result.instance["email"], json!("john@example.com"));
}

#[tokio::test]
async fn conditional_field_only_required_when_final() {
    let registry = ShapeRegistry::new();
    registry.register(
        TargetShape::builder("report")
            .field(FieldSpec::builder("status").build())
            .field(
                FieldSpec::builder("approval_notes")
                    .when(Predicate::field_equals("status", "final"))
                    .validate(ValidationCheck::Required)
                    .end_when()
                    .build(),
            )
            .build(),
    );

    // Draft: the span is untaken, absence of notes is fine
    let draft = registry
        .create("report", json!({"status": "draft"}), CreateOptions::default())
        .await
        .expect("draft needs no notes");
    assert_eq!(draft.instance["approval_notes"], Value::Null);

    // Final without notes: the span is taken and Required fails
    let err = registry
        .create("report", json!({"status": "final"}), CreateOptions::default())
        .await
        .expect_err("final requires notes");
    match err {
        Error::FieldValidation { failure, .. } => {
            assert_eq!(failure.field, "approval_notes");
        }
        other => panic!("expected FieldValidation, got {:?}", other),
    }
}

#[tokio::test]
async fn conditional_else_branch_applies_default() {
    let registry = ShapeRegistry::new();
    registry.register(
        TargetShape::builder("report")
            .field(FieldSpec::builder("status").build())
            .field(
                FieldSpec::builder("approval_notes")
                    .when(Predicate::field_equals("status", "final"))
                    .validate(ValidationCheck::Required)
                    .otherwise()
                    .normalize(NormalizationKind::Default(json!("not yet reviewed")))
                    .end_when()
                    .build(),
            )
            .build(),
    );

    let result = registry
        .create("report", json!({"status": "draft"}), CreateOptions::default())
        .await
        .expect("else branch fills default");
    assert_eq!(result.instance["approval_notes"], json!("not yet reviewed"));
}

#[tokio::test]
async fn ai_transform_retries_until_success() {
    let registry = ShapeRegistry::new();
    registry.register(
        TargetShape::builder("note")
            .field(
                FieldSpec::builder("summary")
                    .ai_transform(3, HashMap::new())
                    .build(),
            )
            .build(),
    );

    let attempts = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&attempts);
    let options = CreateOptions {
        ai_handler: Some(handler_fn(move |params: AiHandlerParams| {
            let seen = Arc::clone(&seen);
            async move {
                let attempt = seen.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(AiHandlerError::Failed(format!("attempt {} failed", attempt)))
                } else {
                    assert!(params.previous_error.is_some());
                    Ok(json!("a concise summary"))
                }
            }
        })),
        ..CreateOptions::default()
    };

    let result = registry
        .create("note", json!({"summary": "long rambling text"}), options)
        .await
        .expect("third attempt succeeds");

    assert_eq!(result.instance["summary"], json!("a concise summary"));
    let ai_entries: Vec<_> = result
        .trace
        .entries_for_field("summary")
        .filter(|e| e.step_kind == StepKind::AiTransform)
        .collect();
    assert_eq!(ai_entries.len(), 3);
    assert_eq!(ai_entries[0].attempt_number, 1);
    assert_eq!(ai_entries[2].attempt_number, 3);
    assert_eq!(ai_entries[2].outcome, TraceOutcome::Updated);
}

#[tokio::test]
async fn ai_exhaustion_is_an_ordinary_field_failure() {
    let registry = ShapeRegistry::new();
    registry.register(
        TargetShape::builder("note")
            .field(
                FieldSpec::builder("summary")
                    .ai_transform(2, HashMap::new())
                    .build(),
            )
            .build(),
    );

    let options = CreateOptions {
        ai_handler: Some(handler_fn(|_params: AiHandlerParams| async {
            Err::<Value, _>(AiHandlerError::Failed("model unavailable".to_string()))
        })),
        ..CreateOptions::default()
    };

    let err = registry
        .create("note", json!({"summary": "text"}), options)
        .await
        .expect_err("all attempts fail");
    match err {
        Error::FieldValidation { failure, trace } => {
            assert_eq!(failure.field, "summary");
            assert_eq!(failure.step_kind, StepKind::AiTransform);
            assert_eq!(failure.attempts, 2);
            assert_eq!(trace.len(), 2);
        }
        other => panic!("expected FieldValidation, got {:?}", other),
    }
}

#[tokio::test]
async fn ai_validation_verdicts_pass_and_fail() {
    let registry = ShapeRegistry::new();
    registry.register(
        TargetShape::builder("note")
            .field(
                FieldSpec::builder("tone")
                    .ai_validate(1, HashMap::new())
                    .build(),
            )
            .build(),
    );

    let options = CreateOptions {
        ai_validation_handler: Some(handler_fn(|params: AiHandlerParams| async move {
            if params.value == json!("friendly") {
                Ok(json!(true))
            } else {
                Ok(json!("tone must be friendly"))
            }
        })),
        ..CreateOptions::default()
    };

    let ok = registry
        .create("note", json!({"tone": "friendly"}), options.clone())
        .await;
    assert!(ok.is_ok());

    let err = registry
        .create("note", json!({"tone": "hostile"}), options)
        .await
        .expect_err("rejected tone");
    match err {
        Error::FieldValidation { failure, .. } => {
            assert_eq!(failure.message, "tone must be friendly");
        }
        other => panic!("expected FieldValidation, got {:?}", other),
    }
}

#[tokio::test]
async fn discriminator_routes_to_branch_shape() {
    let registry = ShapeRegistry::new();
    registry.register(
        TargetShape::builder("document_v1")
            .field(
                FieldSpec::builder("body")
                    .validate(ValidationCheck::Required)
                    .build(),
            )
            .build(),
    );
    registry.register(
        TargetShape::builder("document_v2")
            .field(
                FieldSpec::builder("title")
                    .validate(ValidationCheck::Required)
                    .build(),
            )
            .field(
                FieldSpec::builder("body")
                    .validate(ValidationCheck::Required)
                    .build(),
            )
            .build(),
    );
    registry.register_discriminator(
        "document",
        DiscriminatorRule::new("schema_version")
            .branch("v1", "document_v1")
            .branch("v2", "document_v2"),
    );

    // A v1 payload routed to v2 must fail the v2-only required fields,
    // not silently pass through
    let options = CreateOptions {
        error_mode: validado_core::ErrorMode::CollectAll,
        ..CreateOptions::default()
    };
    let err = registry
        .create(
            "document",
            json!({"schema_version": "v2", "body": "text"}),
            options,
        )
        .await
        .expect_err("v2 requires a title");
    match err {
        Error::AggregateValidation { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].field, "title");
        }
        other => panic!("expected AggregateValidation, got {:?}", other),
    }

    // The happy path reports the routed class in metadata
    let ok = registry
        .create(
            "document",
            json!({"schema_version": "v1", "body": "text"}),
            CreateOptions::default(),
        )
        .await
        .expect("v1 payload fits v1");
    assert_eq!(ok.metadata.unwrap().class_id, "document_v1");
}

#[tokio::test]
async fn unknown_discriminator_value_is_rejected() {
    let registry = ShapeRegistry::new();
    registry.register(order_shape("order_v1"));
    registry.register_discriminator(
        "order",
        DiscriminatorRule::new("version").branch("v1", "order_v1"),
    );

    let err = registry
        .create("order", json!({"version": "v9"}), CreateOptions::default())
        .await
        .expect_err("unmapped version");
    assert!(matches!(err, Error::UnknownDiscriminator { .. }));
}

#[tokio::test]
async fn data_source_derives_from_other_fields() {
    let registry = ShapeRegistry::new();
    registry.register(
        TargetShape::builder("person")
            .field(
                FieldSpec::builder("first")
                    .normalize(NormalizationKind::Trim)
                    .build(),
            )
            .field(
                FieldSpec::builder("last")
                    .normalize(NormalizationKind::Trim)
                    .build(),
            )
            .field(
                FieldSpec::builder("display_name")
                    .derive_from(
                        vec!["first".to_string(), "last".to_string()],
                        |snapshot, _context| {
                            let first = snapshot
                                .get("first")
                                .and_then(Value::as_str)
                                .unwrap_or_default();
                            let last = snapshot
                                .get("last")
                                .and_then(Value::as_str)
                                .unwrap_or_default();
                            json!(format!("{} {}", first, last).trim().to_string())
                        },
                    )
                    .build(),
            )
            .build(),
    );

    let result = registry
        .create(
            "person",
            json!({"first": " Ada ", "last": " Lovelace "}),
            CreateOptions::default(),
        )
        .await
        .expect("derivation succeeds");
    assert_eq!(result.instance["display_name"], json!("Ada Lovelace"));
}

#[tokio::test]
async fn global_registry_entry_point() {
    // The free function goes through the process-wide registry; use a class
    // id unique to this test to stay isolated from other tests
    TargetShape::builder("construction_integration_global_order")
        .field(
            FieldSpec::builder("quantity")
                .coerce(CoercionKind::Number)
                .build(),
        )
        .register();

    let result = create(
        "construction_integration_global_order",
        json!({"quantity": "twelve"}),
        CreateOptions::default(),
    )
    .await
    .expect("globally registered");
    assert_eq!(result.instance["quantity"], json!(12));
}

#[tokio::test]
async fn unregistered_class_is_a_shape_error() {
    let registry = ShapeRegistry::new();
    let err = registry
        .create("nothing", json!({}), CreateOptions::default())
        .await
        .expect_err("no shape");
    assert!(matches!(err, Error::Shape { .. }));
}

#[tokio::test]
async fn metadata_reports_engine_and_passes() {
    let registry = ShapeRegistry::new();
    registry.register(order_shape("order"));

    let result = registry
        .create(
            "order",
            json!({"quantity": 2, "email": "a@b.c"}),
            CreateOptions::default(),
        )
        .await
        .expect("valid input");

    let metadata = result.metadata.expect("metadata present");
    assert_eq!(metadata.class_id, "order");
    assert_eq!(metadata.engine, validado_core::EngineStrategy::Convergent);
    assert_eq!(metadata.passes, Some(1));
    assert!(metadata.duration_ms.is_some());
}
