//! LLM prompt construction for case extraction

use caseflow_domain::{DataType, FieldSchema};

/// Characters of the previous response quoted back in a continuation prompt
pub const CONTINUATION_TAIL_CHARS: usize = 500;

/// Builds the first-attempt extraction prompt from a field schema
pub struct PromptBuilder<'a> {
    schema: &'a FieldSchema,
    records_key: String,
    confidence_range: (i64, i64),
}

impl<'a> PromptBuilder<'a> {
    /// Create a prompt builder for a schema
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self {
            schema,
            records_key: "case_results".to_string(),
            confidence_range: (0, 100),
        }
    }

    /// Key the record list must be returned under
    pub fn with_records_key(mut self, key: impl Into<String>) -> Self {
        self.records_key = key.into();
        self
    }

    /// Confidence scale the model should report on
    pub fn with_confidence_range(mut self, min: i64, max: i64) -> Self {
        self.confidence_range = (min, max);
        self
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        prompt.push_str(&self.field_instructions());

        prompt.push_str(&format!(
            "Output format (a single JSON object, no additional text):\n\
             {{\n  \"{key}\": [\n    {{\n      \"{id}\": {{\"value\": \"1\", \"confidence\": {max}}},\n      \"<field name>\": {{\"value\": <extracted value>, \"confidence\": <{min}-{max}>}}\n    }}\n  ]\n}}\n\n",
            key = self.records_key,
            id = self.schema.identifier_field,
            min = self.confidence_range.0,
            max = self.confidence_range.1,
        ));

        prompt.push_str(OUTPUT_RULES);
        prompt
    }

    /// Fields grouped by category, in order of first appearance
    fn field_instructions(&self) -> String {
        if self.schema.fields.is_empty() {
            return "Extract patient demographics, symptoms and diagnostic details for each case.\n\n"
                .to_string();
        }

        let mut categories: Vec<(String, Vec<String>)> = Vec::new();
        for field in &self.schema.fields {
            let category = field
                .category
                .as_deref()
                .map(title_case)
                .unwrap_or_else(|| "General".to_string());

            let mut line = format!("- {} ({})", field.name, field.data_type.as_str());
            if !field.description.is_empty() {
                line.push_str(&format!(": {}", field.description));
            }
            if field.data_type == DataType::Enum {
                if let Some(values) = field.enum_values.as_ref().filter(|v| !v.is_empty()) {
                    line.push_str(&format!(" (Valid values: {})", values.join(", ")));
                }
            }
            if field.data_type == DataType::Date {
                line.push_str(" [format YYYY-MM-DD]");
            }
            if field.optional {
                line.push_str(" [optional]");
            }

            match categories.iter_mut().find(|(name, _)| *name == category) {
                Some((_, lines)) => lines.push(line),
                None => categories.push((category, vec![line])),
            }
        }

        let mut out = String::from("Extract the following fields for each patient case:\n\n");
        for (category, lines) in categories {
            out.push_str(&format!("## {}\n", category));
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

fn title_case(category: &str) -> String {
    category
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the prompt that asks the model to resume a truncated response
pub struct ContinuationPromptBuilder {
    base_prompt: String,
    records_key: String,
    previous_tail: Option<String>,
}

impl ContinuationPromptBuilder {
    /// Create a builder that restates the original extraction prompt
    pub fn new(base_prompt: impl Into<String>) -> Self {
        Self {
            base_prompt: base_prompt.into(),
            records_key: "case_results".to_string(),
            previous_tail: None,
        }
    }

    /// Key the record list must be returned under
    pub fn with_records_key(mut self, key: impl Into<String>) -> Self {
        self.records_key = key.into();
        self
    }

    /// Quote the end of the previous raw response as a reference point
    pub fn with_previous_response(mut self, response: &str) -> Self {
        let skip = response.chars().count().saturating_sub(CONTINUATION_TAIL_CHARS);
        self.previous_tail = Some(response.chars().skip(skip).collect());
        self
    }

    /// Build a prompt resuming after `committed` records
    ///
    /// `committed` is the number of records already accepted, so the last
    /// one has 0-based index `committed - 1` and the model must start with
    /// record number `committed + 1`.
    pub fn build(&self, committed: usize) -> String {
        let next = committed + 1;
        let mut prompt = String::new();

        prompt.push_str(&self.base_prompt);
        prompt.push_str("\n\nCONTINUATION REQUEST\n");
        prompt.push_str(&format!(
            "Your previous response was truncated. {} cases were already extracted \
             (0-based indices 0 through {}).\n",
            committed,
            committed.saturating_sub(1)
        ));
        prompt.push_str(&format!(
            "Resume strictly after index {}: start with case number {} in the document \
             and continue to the end.\n",
            committed.saturating_sub(1),
            next
        ));
        prompt.push_str(&format!(
            "Do NOT include cases 1 through {} again; they are already recorded.\n",
            committed
        ));

        if let Some(tail) = &self.previous_tail {
            prompt.push_str(
                "\nFor context, here is the last part of your previous response:\n---\n",
            );
            prompt.push_str(tail);
            prompt.push_str("\n---\n");
        }

        prompt.push_str(&format!(
            "\nReturn ONLY a JSON object whose \"{}\" list holds the subsequent cases.\n",
            self.records_key
        ));
        prompt
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"Analyze the attached document and extract every patient case it presents.

Rules:
- Only extract cases that are primary subjects of this document
- Do NOT extract cases cited from other publications or summarized in a literature review
- Number cases in the order they appear in the document, starting at 1
- Every field is an object with the extracted "value" and your "confidence" in it
- Use null for values the document does not state"#;

const OUTPUT_RULES: &str = r#"Remember: Return ONLY valid JSON, no comments, no explanations."#;
