//! Welfare Record Common Library
//!
//! 帳票テンプレート定義・プロンプト生成・AIレスポンス解析・手入力値の上書きなど、
//! I/Oを伴わない共通ロジック

pub mod cell;
pub mod era;
pub mod error;
pub mod filename;
pub mod overrides;
pub mod parser;
pub mod prompts;
pub mod template;
pub mod types;

pub use cell::{CellRef, CellTarget};
pub use error::{Error, Result};
pub use filename::output_file_name;
pub use overrides::{resolve_overrides, AliasTable, DateFormat, ManualOverrides, OverrideKey};
pub use parser::{parse_field_mapping, strip_code_fence};
pub use prompts::{build_extraction_prompt, interim_block, text_input_block, FINAL_INSTRUCTION};
pub use template::{TemplateDefinition, TemplateRegistry};
pub use types::FieldMapping;
