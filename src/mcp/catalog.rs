//! The three tool domains and their catalogs.

use std::path::PathBuf;

use clap::ValueEnum;
use serde_json::json;

use super::tools::{ParamSpec, ParamType, ToolCatalog, ToolDefinition};

const KNOWLEDGE_CATEGORIES: &[&str] = &["tender", "proposal", "reference"];

/// A deployable bridge instance. Instances differ only in catalog and script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Domain {
    DocumentParser,
    KnowledgeBase,
    LogicLearning,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentParser => "document-parser",
            Self::KnowledgeBase => "knowledge-base",
            Self::LogicLearning => "logic-learning",
        }
    }

    /// Name reported in the `initialize` handshake.
    pub fn server_name(self) -> &'static str {
        match self {
            Self::DocumentParser => "document-parser-mcp",
            Self::KnowledgeBase => "knowledge-base-mcp",
            Self::LogicLearning => "logic-learning-mcp",
        }
    }

    /// Filename prefix for this domain's temp input files.
    pub fn temp_prefix(self) -> &'static str {
        match self {
            Self::DocumentParser => "dp_mcp_",
            Self::KnowledgeBase => "kb_mcp_",
            Self::LogicLearning => "ll_mcp_",
        }
    }

    /// Directory holding the domain's Python module, relative to the repository root.
    pub fn module_dir(self) -> PathBuf {
        PathBuf::from("mcp-servers").join(self.as_str()).join("python")
    }

    /// Python module implementing the domain.
    pub fn module_name(self) -> &'static str {
        match self {
            Self::DocumentParser => "document_parser",
            Self::KnowledgeBase => "knowledge_base",
            Self::LogicLearning => "logic_learning",
        }
    }

    /// Class whose methods serve the tools, for modules without a
    /// `{method, args}` file entry point of their own.
    pub fn entry_class(self) -> Option<&'static str> {
        match self {
            Self::DocumentParser => Some("DocumentParser"),
            Self::KnowledgeBase => Some("KnowledgeBaseMCP"),
            Self::LogicLearning => None,
        }
    }

    /// The module file, relative to the repository root.
    pub fn default_script(self) -> PathBuf {
        self.module_dir().join(format!("{}.py", self.module_name()))
    }

    pub fn catalog(self) -> ToolCatalog {
        match self {
            Self::DocumentParser => document_parser_catalog(),
            Self::KnowledgeBase => knowledge_base_catalog(),
            Self::LogicLearning => logic_learning_catalog(),
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// document-parser
// ---------------------------------------------------------------------------

fn document_parser_catalog() -> ToolCatalog {
    ToolCatalog::new(vec![
        ToolDefinition::new(
            "parse_document",
            "Parse a PDF or DOCX document and extract text content, chapters, and structure",
            vec![
                ParamSpec::required(
                    "file_path",
                    ParamType::String,
                    "Absolute path to the document file (PDF or DOCX)",
                ),
                ParamSpec::optional(
                    "extract_chapters",
                    ParamType::Boolean,
                    "Whether to extract chapter structure (default: true)",
                )
                .with_default(json!(true)),
                ParamSpec::optional(
                    "extract_images",
                    ParamType::Boolean,
                    "Whether to extract images from the document (default: false)",
                )
                .with_default(json!(false)),
                ParamSpec::optional(
                    "ocr_enabled",
                    ParamType::Boolean,
                    "Enable OCR for scanned PDFs (default: false)",
                )
                .with_default(json!(false)),
            ],
        ),
        ToolDefinition::new(
            "extract_chapters",
            "Extract chapter structure from document text content",
            vec![
                ParamSpec::required(
                    "content",
                    ParamType::String,
                    "Document text content to analyze",
                ),
                ParamSpec::optional(
                    "patterns",
                    ParamType::StringArray,
                    "Custom regex patterns for chapter detection",
                ),
            ],
        ),
        ToolDefinition::new(
            "extract_images",
            "Extract all images from a PDF or DOCX document",
            vec![
                ParamSpec::required(
                    "file_path",
                    ParamType::String,
                    "Absolute path to the document file",
                ),
                ParamSpec::required(
                    "output_dir",
                    ParamType::String,
                    "Directory to save extracted images",
                ),
                ParamSpec::optional("format", ParamType::String, "Output image format (png, jpeg)")
                    .one_of(&["png", "jpeg"])
                    .with_default(json!("png")),
            ],
        ),
        ToolDefinition::new(
            "get_document_info",
            "Get basic information about a document (pages, size, format)",
            vec![ParamSpec::required(
                "file_path",
                ParamType::String,
                "Absolute path to the document file",
            )],
        ),
    ])
}

// ---------------------------------------------------------------------------
// knowledge-base
// ---------------------------------------------------------------------------

fn category_filter(description: &'static str) -> ParamSpec {
    ParamSpec::optional("category", ParamType::String, description).one_of(KNOWLEDGE_CATEGORIES)
}

fn knowledge_base_catalog() -> ToolCatalog {
    ToolCatalog::new(vec![
        ToolDefinition::new(
            "search_knowledge",
            "Search knowledge base entries by keyword",
            vec![
                ParamSpec::required("query", ParamType::String, "Search keywords"),
                category_filter("Category filter (tender/proposal/reference)"),
                ParamSpec::optional("limit", ParamType::Integer, "Maximum number of results")
                    .with_default(json!(10)),
                ParamSpec::optional("min_score", ParamType::Number, "Minimum relevance score")
                    .with_default(json!(0.0)),
            ],
        ),
        ToolDefinition::new(
            "add_knowledge_entry",
            "Add a knowledge base entry",
            vec![
                ParamSpec::required("file_id", ParamType::String, "Source file ID"),
                ParamSpec::required("category", ParamType::String, "Category")
                    .one_of(KNOWLEDGE_CATEGORIES),
                ParamSpec::required("title", ParamType::String, "Title"),
                ParamSpec::required("content", ParamType::String, "Content"),
                ParamSpec::optional("keywords", ParamType::StringArray, "Keyword list"),
                ParamSpec::optional(
                    "importance_score",
                    ParamType::Number,
                    "Importance score (0-100)",
                )
                .with_default(json!(50.0)),
                ParamSpec::optional("metadata", ParamType::Object, "Free-form metadata"),
            ],
        ),
        ToolDefinition::new(
            "get_knowledge_entry",
            "Get the details of a knowledge base entry",
            vec![ParamSpec::required("entry_id", ParamType::String, "Entry ID")],
        ),
        ToolDefinition::new(
            "list_knowledge_entries",
            "List knowledge base entries",
            vec![
                ParamSpec::optional("file_id", ParamType::String, "Source file ID filter"),
                category_filter("Category filter"),
                ParamSpec::optional("limit", ParamType::Integer, "Maximum number of results")
                    .with_default(json!(50)),
                ParamSpec::optional("offset", ParamType::Integer, "Offset").with_default(json!(0)),
            ],
        ),
        ToolDefinition::new(
            "delete_knowledge_entry",
            "Delete a knowledge base entry",
            vec![ParamSpec::required("entry_id", ParamType::String, "Entry ID")],
        ),
        ToolDefinition::new(
            "get_knowledge_statistics",
            "Get knowledge base statistics",
            vec![],
        )
        .invoking("get_statistics"),
        ToolDefinition::new(
            "search_knowledge_semantic",
            "Semantic vector search over the knowledge base (embedding similarity)",
            vec![
                ParamSpec::required("query", ParamType::String, "Search query"),
                category_filter("Category filter (tender/proposal/reference)"),
                ParamSpec::optional("limit", ParamType::Integer, "Maximum number of results")
                    .with_default(json!(10)),
                ParamSpec::optional(
                    "min_similarity",
                    ParamType::Number,
                    "Minimum similarity threshold (0-1)",
                )
                .with_default(json!(0.7)),
            ],
        ),
        ToolDefinition::new(
            "reindex_embeddings",
            "Rebuild knowledge base embeddings in batches",
            vec![
                ParamSpec::optional("batch_size", ParamType::Integer, "Batch size")
                    .with_default(json!(10)),
                category_filter("Only rebuild this category"),
            ],
        ),
    ])
}

// ---------------------------------------------------------------------------
// logic-learning
// ---------------------------------------------------------------------------

fn logic_learning_catalog() -> ToolCatalog {
    ToolCatalog::new(vec![
        ToolDefinition::new(
            "start_learning",
            "Start a logic learning task (chapter-level or global)",
            vec![
                ParamSpec::required(
                    "file_ids",
                    ParamType::StringArray,
                    "IDs of files to learn from",
                ),
                ParamSpec::required(
                    "learning_type",
                    ParamType::String,
                    "Learning type: chapter or global",
                )
                .one_of(&["chapter", "global"]),
                ParamSpec::optional(
                    "chapter_ids",
                    ParamType::StringArray,
                    "Chapter IDs (used by chapter-level learning)",
                )
                .with_default(json!([])),
            ],
        ),
        ToolDefinition::new(
            "get_learning_status",
            "Query the status of a learning task",
            vec![ParamSpec::required("task_id", ParamType::String, "Task ID")],
        ),
        ToolDefinition::new(
            "get_learning_result",
            "Get the result of a completed learning task",
            vec![ParamSpec::required("task_id", ParamType::String, "Task ID")],
        ),
        ToolDefinition::new(
            "get_logic_database",
            "Get logic rule database statistics",
            vec![ParamSpec::optional("category", ParamType::String, "Category filter")],
        ),
    ])
}
