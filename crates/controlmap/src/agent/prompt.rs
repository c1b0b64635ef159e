use crate::catalog::provider_display_name;
use crate::intake::{FieldMappings, FrameworkInfo};

/// Characters of framework text embedded in a prompt.
pub const MAX_CONTENT_CHARS: usize = 50_000;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a compliance mapping assistant. You map controls \
from compliance framework documents to provider security checks. You only read the material you \
are given, never modify files, and answer with a single JSON object that follows the requested \
structure exactly.";

const OUTPUT_FORMAT: &str = r#"{
  "Framework": "<framework short name>",
  "Name": "<framework full name>",
  "Version": "<framework version>",
  "Provider": "<provider>",
  "Description": "<mapping description>",
  "Requirements": [
    {
      "Id": "<control id>",
      "Name": "<control name>",
      "Description": "<control description>",
      "Attributes": [
        {
          "ItemId": "<control id>",
          "Section": "<section>",
          "SubSection": "<subsection>",
          "SubGroup": "<subgroup>",
          "Service": "<service>"
        }
      ],
      "Checks": ["<check id>"]
    }
  ]
}"#;

pub struct PromptContext<'a> {
    pub framework: &'a FrameworkInfo,
    pub provider: &'a str,
    pub framework_content: &'a str,
    pub checks_list: &'a str,
    pub field_mappings: &'a FieldMappings,
    pub custom_instructions: Option<&'a str>,
    pub enable_subgroup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub trait PromptBuilder: Send + Sync {
    fn build(&self, ctx: &PromptContext<'_>) -> Prompt;
}

/// Builds the mapping instructions with the framework text and the check
/// list embedded directly in the prompt.
pub struct TemplatePromptBuilder {
    system_prompt: String,
}

impl TemplatePromptBuilder {
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

impl Default for TemplatePromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn format_field_mappings(mappings: &FieldMappings, enable_subgroup: bool) -> String {
    let fields: [(&str, &Option<String>, Option<&Option<String>>); 7] = [
        ("Control ID", &mappings.id_field, Some(&mappings.id_format_example)),
        ("Control Name", &mappings.name_field, Some(&mappings.name_format_example)),
        (
            "Description",
            &mappings.description_field,
            Some(&mappings.description_format_example),
        ),
        ("Section", &mappings.section_field, Some(&mappings.section_format_example)),
        (
            "SubSection",
            &mappings.subsection_field,
            Some(&mappings.subsection_format_example),
        ),
        ("SubGroup", &mappings.subgroup_field, Some(&mappings.subgroup_format_example)),
        ("Service", &mappings.service_field, None),
    ];

    let mut lines = Vec::new();
    for (label, field, example) in fields {
        if label == "SubGroup" && !enable_subgroup {
            continue;
        }
        let Some(field) = field.as_deref().filter(|f| !f.is_empty()) else {
            continue;
        };

        let mut line = format!("- {} is in the field/column: \"{}\"", label, field);
        if let Some(example) = example.and_then(|e| e.as_deref()).filter(|e| !e.is_empty()) {
            line.push_str(&format!(
                ". IMPORTANT: Follow this exact format pattern: \"{}\" (preserve numbering, prefixes, and exact formatting)",
                example
            ));
        }
        lines.push(line);
    }

    if lines.is_empty() {
        return "Use your best judgment to identify control fields in the document.".to_string();
    }

    lines.insert(0, "The document uses the following field structure:".to_string());
    lines.join("\n")
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build(&self, ctx: &PromptContext<'_>) -> Prompt {
        let provider = provider_display_name(ctx.provider);
        let framework = ctx.framework;
        let version = framework.version.as_deref().unwrap_or("Not specified");

        let mut framework_info = format!(
            "- Framework (short name): {}\n- Version: {}\n- Provider Target: {}",
            framework.name, version, provider
        );
        if let Some(full_name) = &framework.full_name {
            framework_info.push_str(&format!("\n- Full Name: {}", full_name));
        }

        let name_instruction = match &framework.full_name {
            Some(full_name) => format!(
                "8. The \"Name\" field in the output JSON MUST be exactly: \"{}\"",
                full_name
            ),
            None => "8. The \"Name\" field should be a full descriptive name of the framework extracted from the document".to_string(),
        };

        let subgroup_instruction = if ctx.enable_subgroup {
            "9. Include the \"SubGroup\" field for sub-sections (e.g., 4.1, 4.2, 4.3 under a parent section 4). Each sub-section should be a separate entry in the Requirements array.".to_string()
        } else {
            "9. DO NOT include the \"SubGroup\" field in the output JSON - omit it entirely from each requirement object.\n\
             10. IMPORTANT: Do NOT create separate entries for sub-sections (like 4.1, 4.2, 4.3). Instead, merge all sub-sections into their parent control (e.g., section 4). Combine all checks from sub-sections into the parent control's Checks array.".to_string()
        };

        let description_instruction = match &framework.description {
            Some(description) => format!(
                "11. The \"Description\" field in the output JSON MUST be exactly: \"{}\"",
                description
            ),
            None => "11. The \"Description\" field should be a concise description of this mapping generated from the document context".to_string(),
        };

        let content: String = ctx.framework_content.chars().take(MAX_CONTENT_CHARS).collect();
        let custom = ctx
            .custom_instructions
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("None provided.");

        let user = format!(
            "# Control Mapping Task\n\
             \n\
             ## Objective\n\
             Map compliance controls from the framework document to {provider} security checks.\n\
             \n\
             ## Framework Information\n\
             {framework_info}\n\
             \n\
             ## Framework Document Content\n\
             ```\n\
             {content}\n\
             ```\n\
             \n\
             ## Field Mapping Instructions\n\
             {fields}\n\
             \n\
             ## Available Security Checks for {provider}\n\
             {checks}\n\
             \n\
             ## Additional Instructions\n\
             {custom}\n\
             \n\
             ## Required Output Format\n\
             Return a JSON object with this exact structure:\n\
             \n\
             {output_format}\n\
             \n\
             CRITICAL INSTRUCTIONS:\n\
             1. In the \"Checks\" array, use the exact CheckID values from the list above\n\
             2. Output ONLY valid JSON - no explanatory text before or after\n\
             3. If no suitable check exists for a control, leave the Checks array empty\n\
             4. PRESERVE EXACT FORMAT: For Section, SubSection, Id, and Name fields, copy the EXACT text from the document INCLUDING:\n   \
             - Number prefixes (e.g., \"2.0 Security Domain Policies\" NOT just \"Security Domain Policies\")\n   \
             - Original punctuation and formatting\n   \
             - Full hierarchy indicators (e.g., \"2.1.1\" not just the text)\n\
             5. The Id field should be the control identifier exactly as it appears in the document\n\
             6. Section and SubSection should include their full identifiers/numbers as shown in the document\n\
             7. The \"Provider\" field in the output JSON MUST be exactly: \"{provider}\"\n\
             {name_instruction}\n\
             {subgroup_instruction}\n\
             {description_instruction}\n\
             \n\
             Analyze the framework and output the mapping JSON:\n",
            provider = provider,
            framework_info = framework_info,
            content = content,
            fields = format_field_mappings(ctx.field_mappings, ctx.enable_subgroup),
            checks = ctx.checks_list,
            custom = custom,
            output_format = OUTPUT_FORMAT,
            name_instruction = name_instruction,
            subgroup_instruction = subgroup_instruction,
            description_instruction = description_instruction,
        );

        Prompt {
            system: self.system_prompt.clone(),
            user,
        }
    }
}
