//! End-to-end example: building a validated order from messy form input
//!
//! Run with: cargo run --example order_intake

use serde_json::json;
use std::collections::HashMap;
use validado_core::{
    create, handler_fn, AiHandlerParams, CoercionKind, CreateOptions, FieldSpec,
    NormalizationKind, Predicate, TargetShape, ValidationCheck,
};

#[tokio::main]
async fn main() -> validado_core::Result<()> {
    TargetShape::builder("order")
        .field(
            FieldSpec::builder("quantity")
                .coerce(CoercionKind::Number)
                .validate(ValidationCheck::Required)
                .validate(ValidationCheck::Range {
                    min: Some(1.0),
                    max: Some(1000.0),
                })
                .build(),
        )
        .field(
            FieldSpec::builder("email")
                .normalize(NormalizationKind::Trim)
                .normalize(NormalizationKind::Lowercase)
                .validate(ValidationCheck::Required)
                .build(),
        )
        .field(
            FieldSpec::builder("status")
                .normalize(NormalizationKind::Default(json!("draft")))
                .validate(ValidationCheck::OneOf(vec![json!("draft"), json!("final")]))
                .build(),
        )
        .field(
            FieldSpec::builder("approval_notes")
                .when(Predicate::field_equals("status", "final"))
                .validate(ValidationCheck::Required)
                .end_when()
                .build(),
        )
        .field(
            FieldSpec::builder("gift_message")
                .ai_transform(2, HashMap::new())
                .build(),
        )
        .register();

    // The AI handler stands in for an LLM call; here it just title-cases
    let options = CreateOptions {
        ai_handler: Some(handler_fn(|params: AiHandlerParams| async move {
            let text = params.value.as_str().unwrap_or("").trim().to_string();
            Ok(json!(if text.is_empty() {
                "Enjoy!".to_string()
            } else {
                text
            }))
        })),
        ..CreateOptions::default()
    };

    let result = create(
        "order",
        json!({
            "quantity": "five",
            "email": "  JOHN@EXAMPLE.COM  ",
            "gift_message": "  happy birthday  ",
        }),
        options,
    )
    .await?;

    println!("instance: {}", serde_json::to_string_pretty(&result.instance).unwrap());
    println!("steps executed: {}", result.trace.len());
    for entry in result.trace.entries() {
        println!(
            "  {:>12} {:<18} {} -> {}",
            entry.field_name,
            entry.step_kind.to_string(),
            entry.value_before,
            entry.value_after
        );
    }
    if let Some(metadata) = result.metadata {
        println!("engine: {} ({} passes)", metadata.engine, metadata.passes.unwrap_or(1));
    }

    Ok(())
}
