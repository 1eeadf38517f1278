//! Role personas for the live agent
//!
//! A session speaks as one of two fixed personas. The guest-facing barista
//! recommends drinks; the operator-facing COO talks numbers with the store
//! manager. Each persona pins a prebuilt voice identity and a system
//! instruction template that embeds the serialized menu catalog.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Voice identity for the guest barista persona
pub const GUEST_VOICE: &str = "Kore";

/// Voice identity for the operator analyst persona
pub const OPERATOR_VOICE: &str = "Fenrir";

/// Who the session is speaking with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Café guest, served by the warm barista persona
    Guest,
    /// Store manager, served by the analytical COO persona
    Operator,
}

impl Role {
    /// Prebuilt voice identity used for synthesized replies
    pub fn voice_name(&self) -> &'static str {
        match self {
            Role::Guest => GUEST_VOICE,
            Role::Operator => OPERATOR_VOICE,
        }
    }

    /// Human-readable session title
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Guest => "Woosh Barista",
            Role::Operator => "Woosh COO",
        }
    }

    /// Build the system instruction for this persona with the serialized
    /// menu catalog embedded as context.
    pub fn system_instruction(&self, menu_context: &str) -> String {
        match self {
            Role::Guest => format!(
                "You are a friendly, warm, and knowledgeable barista at WOOSH CAFE. \
                 Here is the menu data: {menu_context}. \
                 Your job is to recommend drinks, explain flavors (e.g., Anaerobic \
                 sun-dried coffee tastes fruity), and help guests feel relaxed. \
                 Keep answers concise and spoken naturally."
            ),
            Role::Operator => format!(
                "You are the AI Chief Operating Officer (COO) for WOOSH CAFE. \
                 Here is the current menu data: {menu_context}. \
                 Your job is to analyze business performance, suggest inventory \
                 optimizations, discuss ESG goals, and help the store manager make \
                 decisions. Tone: Professional, data-driven, yet supportive."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_identities() {
        assert_eq!(Role::Guest.voice_name(), "Kore");
        assert_eq!(Role::Operator.voice_name(), "Fenrir");
    }

    #[test]
    fn test_guest_instruction_embeds_menu() {
        let menu = r#"[{"title":"Coffee","items":[{"name":"Latte","price":160}]}]"#;
        let instruction = Role::Guest.system_instruction(menu);
        assert!(instruction.contains("barista at WOOSH CAFE"));
        assert!(instruction.contains(menu));
    }

    #[test]
    fn test_operator_instruction_embeds_menu() {
        let menu = r#"[{"title":"Coffee","items":[]}]"#;
        let instruction = Role::Operator.system_instruction(menu);
        assert!(instruction.contains("Chief Operating Officer"));
        assert!(instruction.contains(menu));
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Guest).unwrap(), "\"guest\"");
        let role: Role = serde_json::from_str("\"operator\"").unwrap();
        assert_eq!(role, Role::Operator);
    }
}
