//! 非靶向代谢组学工作流的结构化描述

use serde::{Deserialize, Serialize};

/// 工作流中的一个步骤
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// 从 1 开始，决定步骤顺序
    pub step_number: i64,
    pub step_name: String,
    pub description: String,
    /// 高层分类，如 sample prep、LC-MS acquisition、statistics
    pub category: String,
    pub tools_software: Vec<String>,
    pub databases_apis: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub is_explicit_in_paper: bool,
}

/// 一篇论文的工作流
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub paper_has_untargeted_metabolomics: bool,
    pub workflow_steps: Vec<WorkflowStep>,
    pub unspecified_or_omitted_steps: Vec<String>,
    pub notes_on_ambiguity: String,
}

/// 步骤编号不满足唯一且严格递增
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOrderIssue {
    /// 出问题的位置（0-based）
    pub position: usize,
    pub previous: i64,
    pub current: i64,
}

impl std::fmt::Display for StepOrderIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "第 {} 个步骤编号 {} 未大于前一个编号 {}",
            self.position + 1,
            self.current,
            self.previous
        )
    }
}

impl WorkflowDescription {
    /// 没有全文时的占位结果
    pub fn no_full_text() -> Self {
        Self::sentinel("No full text extracted from PDF.")
    }

    /// 多次尝试后仍失败时的占位结果
    pub fn extraction_failed(attempts: usize, last_error: &str) -> Self {
        Self::sentinel(format!(
            "Extraction failed after {} attempts: {}",
            attempts, last_error
        ))
    }

    fn sentinel(notes: impl Into<String>) -> Self {
        Self {
            paper_has_untargeted_metabolomics: false,
            workflow_steps: Vec::new(),
            unspecified_or_omitted_steps: Vec::new(),
            notes_on_ambiguity: notes.into(),
        }
    }

    /// 检查步骤编号是否唯一且严格递增
    pub fn check_step_order(&self) -> Result<(), StepOrderIssue> {
        for (position, pair) in self.workflow_steps.windows(2).enumerate() {
            let (previous, current) = (pair[0].step_number, pair[1].step_number);
            if current <= previous {
                return Err(StepOrderIssue {
                    position: position + 1,
                    previous,
                    current,
                });
            }
        }
        Ok(())
    }
}

/// `JSON Schema`，作为服务端强制的输出格式
pub fn workflow_schema() -> serde_json::Value {
    let string_array = serde_json::json!({ "type": "array", "items": { "type": "string" } });
    serde_json::json!({
        "type": "object",
        "properties": {
            "paper_has_untargeted_metabolomics": { "type": "boolean" },
            "workflow_steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "step_number": { "type": "integer" },
                        "step_name": { "type": "string" },
                        "description": { "type": "string" },
                        "category": {
                            "type": "string",
                            "description": "High-level category (e.g., sample prep, LC-MS acquisition, preprocessing, feature extraction, normalization, statistics, annotation, pathway analysis)"
                        },
                        "tools_software": string_array,
                        "databases_apis": string_array,
                        "inputs": string_array,
                        "outputs": string_array,
                        "is_explicit_in_paper": {
                            "type": "boolean",
                            "description": "True if this step is explicitly described; false if strongly implied."
                        }
                    },
                    "required": [
                        "step_number",
                        "step_name",
                        "description",
                        "category",
                        "tools_software",
                        "databases_apis",
                        "inputs",
                        "outputs",
                        "is_explicit_in_paper"
                    ]
                }
            },
            "unspecified_or_omitted_steps": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Important steps that seem missing or under-specified."
            },
            "notes_on_ambiguity": {
                "type": "string",
                "description": "Short explanation of any ambiguities or uncertainties in the extracted workflow."
            }
        },
        "required": [
            "paper_has_untargeted_metabolomics",
            "workflow_steps",
            "unspecified_or_omitted_steps",
            "notes_on_ambiguity"
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(number: i64, name: &str) -> WorkflowStep {
        WorkflowStep {
            step_number: number,
            step_name: name.to_string(),
            description: format!("{} description", name),
            category: "preprocessing".to_string(),
            tools_software: vec!["XCMS".to_string(), "MS-DIAL".to_string()],
            databases_apis: vec!["HMDB".to_string()],
            inputs: vec!["raw .mzML".to_string(), "QC pool".to_string()],
            outputs: vec!["feature table".to_string()],
            is_explicit_in_paper: true,
        }
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let workflow = WorkflowDescription {
            paper_has_untargeted_metabolomics: true,
            workflow_steps: vec![step(1, "extraction"), step(2, "LC-MS"), step(3, "peak picking")],
            unspecified_or_omitted_steps: vec!["normalization method".to_string()],
            notes_on_ambiguity: "column temperature unclear".to_string(),
        };

        let json = serde_json::to_string(&workflow).unwrap();
        let parsed: WorkflowDescription = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, workflow);
        assert_eq!(parsed.workflow_steps[1].step_name, "LC-MS");
        assert_eq!(parsed.workflow_steps[0].inputs, vec!["raw .mzML", "QC pool"]);
    }

    #[test]
    fn test_step_order_ok() {
        let workflow = WorkflowDescription {
            workflow_steps: vec![step(1, "a"), step(2, "b"), step(5, "c")],
            ..Default::default()
        };
        assert!(workflow.check_step_order().is_ok());
        assert!(WorkflowDescription::no_full_text().check_step_order().is_ok());
    }

    #[test]
    fn test_step_order_duplicate_and_descending() {
        let duplicate = WorkflowDescription {
            workflow_steps: vec![step(1, "a"), step(2, "b"), step(2, "c")],
            ..Default::default()
        };
        let issue = duplicate.check_step_order().unwrap_err();
        assert_eq!(issue.position, 2);
        assert_eq!((issue.previous, issue.current), (2, 2));

        let descending = WorkflowDescription {
            workflow_steps: vec![step(3, "a"), step(1, "b")],
            ..Default::default()
        };
        assert!(descending.check_step_order().is_err());
    }

    #[test]
    fn test_sentinels() {
        let none = WorkflowDescription::no_full_text();
        assert!(!none.paper_has_untargeted_metabolomics);
        assert!(none.workflow_steps.is_empty());
        assert_eq!(none.notes_on_ambiguity, "No full text extracted from PDF.");

        let failed = WorkflowDescription::extraction_failed(3, "timeout");
        assert_eq!(
            failed.notes_on_ambiguity,
            "Extraction failed after 3 attempts: timeout"
        );
    }

    #[test]
    fn test_off_schema_json_is_rejected() {
        for reply in [
            "{}",
            "[]",
            r#"{"paper_has_untargeted_metabolomics": true}"#,
            r#"{"has_untargeted_metabolomics": true, "steps": [1, 2]}"#,
        ] {
            assert!(
                serde_json::from_str::<WorkflowDescription>(reply).is_err(),
                "accepted {}",
                reply
            );
        }

        // 步骤缺字段同样不接受
        let missing_step_fields = r#"{
            "paper_has_untargeted_metabolomics": true,
            "workflow_steps": [{"step_number": 1, "step_name": "Extraction"}],
            "unspecified_or_omitted_steps": [],
            "notes_on_ambiguity": ""
        }"#;
        assert!(serde_json::from_str::<WorkflowDescription>(missing_step_fields).is_err());
    }

    #[test]
    fn test_schema_requires_all_top_level_fields() {
        let schema = workflow_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
        assert_eq!(
            schema["properties"]["workflow_steps"]["items"]["required"]
                .as_array()
                .unwrap()
                .len(),
            9
        );
    }
}
