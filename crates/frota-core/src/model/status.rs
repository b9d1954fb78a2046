use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The five lifecycle statuses of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Aguardando,
    EmExecucao,
    AguardandoPecas,
    Finalizada,
    Cancelada,
}

impl Status {
    /// Every status, in ledger column order.
    pub const ALL: [Self; 5] = [
        Self::Aguardando,
        Self::EmExecucao,
        Self::AguardandoPecas,
        Self::Finalizada,
        Self::Cancelada,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aguardando => "aguardando",
            Self::EmExecucao => "em_execucao",
            Self::AguardandoPecas => "aguardando_pecas",
            Self::Finalizada => "finalizada",
            Self::Cancelada => "cancelada",
        }
    }

    /// Terminal statuses have no outgoing edges and freeze the ledger.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalizada | Self::Cancelada)
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - between any two of `aguardando`, `em_execucao`, `aguardando_pecas`
    /// - from any of those into `finalizada` or `cancelada`
    ///
    /// Terminal statuses have no outgoing edges and a status never
    /// transitions to itself.
    pub fn can_transition_to(&self, target: Self) -> Result<(), InvalidTransition> {
        if self.is_terminal() {
            return Err(InvalidTransition {
                from: *self,
                to: target,
                reason: "terminal status cannot be left",
            });
        }

        if *self == target {
            return Err(InvalidTransition {
                from: *self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        Ok(())
    }
}

/// Work order priority. Ordering goes from least to most pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Baixa,
    #[default]
    Normal,
    Alta,
    Urgente,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baixa => "baixa",
            Self::Normal => "normal",
            Self::Alta => "alta",
            Self::Urgente => "urgente",
        }
    }
}

/// Lifecycle of a part request. Carries no timing semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartStatus {
    #[default]
    Pendente,
    Solicitada,
    Recebida,
    Cancelada,
}

impl PartStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pendente => "pendente",
            Self::Solicitada => "solicitada",
            Self::Recebida => "recebida",
            Self::Cancelada => "cancelada",
        }
    }
}

/// Error returned when a status transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move from {} to {}: {}", self.from, self.to, self.reason)
    }
}

impl std::error::Error for InvalidTransition {}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, trim, and fold spaces/hyphens into underscores so that
/// `"Em execução"`-style board labels and `em-execucao` both resolve.
fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .replace(['ç'], "c")
        .replace(['ã', 'á', 'â'], "a")
        .replace(['é', 'ê'], "e")
        .replace(['-', ' '], "_")
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "aguardando" => Ok(Self::Aguardando),
            "em_execucao" | "emexecucao" => Ok(Self::EmExecucao),
            "aguardando_pecas" | "aguardandopecas" => Ok(Self::AguardandoPecas),
            "finalizada" => Ok(Self::Finalizada),
            "cancelada" => Ok(Self::Cancelada),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "baixa" => Ok(Self::Baixa),
            "normal" | "media" => Ok(Self::Normal),
            "alta" => Ok(Self::Alta),
            "urgente" => Ok(Self::Urgente),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for PartStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "pendente" => Ok(Self::Pendente),
            "solicitada" => Ok(Self::Solicitada),
            "recebida" => Ok(Self::Recebida),
            "cancelada" => Ok(Self::Cancelada),
            _ => Err(ParseEnumError {
                expected: "part status",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidTransition, Priority, Status};
    use std::str::FromStr;

    #[test]
    fn status_json_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&Status::EmExecucao).unwrap(),
            "\"em_execucao\""
        );
        assert_eq!(
            serde_json::from_str::<Status>("\"aguardando_pecas\"").unwrap(),
            Status::AguardandoPecas
        );
        assert_eq!(serde_json::to_string(&Priority::Urgente).unwrap(), "\"urgente\"");
    }

    #[test]
    fn parse_accepts_board_spellings() {
        assert_eq!(Status::from_str("Em execução").unwrap(), Status::EmExecucao);
        assert_eq!(Status::from_str("aguardando-pecas").unwrap(), Status::AguardandoPecas);
        assert_eq!(Status::from_str(" FINALIZADA ").unwrap(), Status::Finalizada);
        assert_eq!(Priority::from_str("média").unwrap(), Priority::Normal);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert!(Status::from_str("pausada").is_err());
        assert!(Priority::from_str("critica").is_err());
    }

    #[test]
    fn open_statuses_are_mutually_reachable() {
        let open = [Status::Aguardando, Status::EmExecucao, Status::AguardandoPecas];
        for from in open {
            for to in Status::ALL {
                if from == to {
                    continue;
                }
                assert!(from.can_transition_to(to).is_ok(), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for from in [Status::Finalizada, Status::Cancelada] {
            for to in Status::ALL {
                assert!(matches!(
                    from.can_transition_to(to),
                    Err(InvalidTransition { reason: "terminal status cannot be left", .. })
                ));
            }
        }
    }

    #[test]
    fn self_transition_is_rejected() {
        assert!(matches!(
            Status::EmExecucao.can_transition_to(Status::EmExecucao),
            Err(InvalidTransition {
                from: Status::EmExecucao,
                to: Status::EmExecucao,
                ..
            })
        ));
    }
}
