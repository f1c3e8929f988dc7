// Templates use {question}, {result} and {schema} placeholders.
use regex::{Captures, Regex};
use serde::Deserialize;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid placeholder pattern"));

const DEFAULT_SQL_TEMPLATE: &str = r#"Role: DuckDB SQL expert for Hospital Clínico Magallanes.
Task: Generate ONE read-only SQL query.

Tables:
- directorio_telefonico (nombre_referencia, numero_anexo, ubicacion) -> Use for People/Phones.
- vista_ubicaciones_maestra (nombre_unidad, nombre_piso, nivel_numero, nombre_edificio) -> Use for Places/Units.
- areas (nombre, ubicacion, tiempo_espera_minutos) -> Use for waiting times.
- pacientes (nombre_completo, estado, ubicacion_actual, diagnostico_breve, medico_a_cargo) -> Use for patients.

CRITICAL RULES:
1. ALWAYS use wildcard % for text searches with ILIKE.
2. IGNORE ACCENTS: Use strip_accents() on both sides.
   - Example: WHERE strip_accents(nombre_referencia) ILIKE strip_accents('%search_term%')
3. MANDATORY SELECT:
   - Always select the NAME and the VALUE (e.g., nombre_referencia AND numero_anexo).
4. LIMIT 5.
5. Return ONLY the SQL code.

Examples:
Q: Rayos X? -> SELECT ubicacion, tiempo_espera_minutos FROM areas WHERE nombre ILIKE '%Rayos%' LIMIT 5;
Q: Anexo de farmacia? -> SELECT nombre_referencia, numero_anexo, ubicacion FROM directorio_telefonico WHERE strip_accents(nombre_referencia) ILIKE strip_accents('%farmacia%') LIMIT 5;

Question: {question}
SQL:"#;

const DEFAULT_ANSWER_TEMPLATE: &str = r#"Task: Format the database result into a clean Spanish sentence.
User Question: {question}
Data:
{result}

Instructions:
- Do NOT repeat the question.
- Use ONLY the Data above. Never invent names, numbers or places.
- If it's a contact, format as: "- Nombre: Anexo"
- If it's a location, format as: "- Lugar: Ubicación"
- Construct a direct answer based on the Data.

Respuesta:"#;

/// Fixed answers for every short-circuit exit of the pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CannedMessages {
    pub service_unavailable: String,
    pub invalid_query: String,
    pub execution_error: String,
    /// May reference `{question}`.
    pub no_data: String,
    pub unexpected: String,
}

impl Default for CannedMessages {
    fn default() -> Self {
        Self {
            service_unavailable: "⚠️ Error: El servicio de IA no está disponible.".to_string(),
            invalid_query: "No pude generar una consulta válida para tu pregunta.".to_string(),
            execution_error: "Hubo un error técnico al consultar la base de datos.".to_string(),
            no_data: "No encontré información exacta en la base de datos sobre '{question}'."
                .to_string(),
            unexpected: "Lo siento, ocurrió un error inesperado al procesar tu solicitud."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptCatalog {
    pub sql_template: String,
    pub answer_template: String,
    /// Static schema description. When unset and the SQL template asks for
    /// `{schema}`, the database is introspected on every request instead.
    pub schema_context: Option<String>,
    pub messages: CannedMessages,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self {
            sql_template: DEFAULT_SQL_TEMPLATE.to_string(),
            answer_template: DEFAULT_ANSWER_TEMPLATE.to_string(),
            schema_context: None,
            messages: CannedMessages::default(),
        }
    }
}

impl PromptCatalog {
    /// Checks that every template carries the placeholders the pipeline fills.
    pub fn validate(&self) -> Result<(), String> {
        if !self.sql_template.contains("{question}") {
            return Err("SQL template must contain {question}".to_string());
        }
        for placeholder in ["{question}", "{result}"] {
            if !self.answer_template.contains(placeholder) {
                return Err(format!("answer template must contain {}", placeholder));
            }
        }
        Ok(())
    }

    pub fn wants_schema(&self) -> bool {
        self.sql_template.contains("{schema}")
    }

    pub fn sql_prompt(&self, question: &str, schema: &str) -> String {
        render(&self.sql_template, &[("question", question), ("schema", schema)])
    }

    pub fn answer_prompt(&self, question: &str, result: &str) -> String {
        render(&self.answer_template, &[("question", question), ("result", result)])
    }

    pub fn no_data_message(&self, question: &str) -> String {
        render(&self.messages.no_data, &[("question", question)])
    }
}

/// Single-pass placeholder substitution. Unknown placeholders are left as
/// they are, and substituted values are never re-scanned.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = PromptCatalog::default();
        assert!(catalog.validate().is_ok());
        assert!(!catalog.wants_schema());
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("{question} / {other}", &[("question", "hola")]);
        assert_eq!(out, "hola / {other}");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let catalog = PromptCatalog::default();
        let prompt = catalog.answer_prompt("¿{result}?", "- Farmacia");
        assert!(prompt.contains("User Question: ¿{result}?"));
        assert!(prompt.contains("- Farmacia"));
    }

    #[test]
    fn test_sql_prompt_with_schema() {
        let catalog = PromptCatalog {
            sql_template: "Schema:\n{schema}\nQ: {question}".to_string(),
            ..PromptCatalog::default()
        };
        assert!(catalog.wants_schema());
        assert_eq!(catalog.sql_prompt("x", "areas(nombre)"), "Schema:\nareas(nombre)\nQ: x");
    }

    #[test]
    fn test_no_data_message_echoes_question() {
        let catalog = PromptCatalog::default();
        assert_eq!(
            catalog.no_data_message("¿Dónde está el paciente Batman?"),
            "No encontré información exacta en la base de datos sobre '¿Dónde está el paciente Batman?'."
        );
    }

    #[test]
    fn test_validate_rejects_missing_placeholders() {
        let catalog = PromptCatalog {
            answer_template: "Data: {result}".to_string(),
            ..PromptCatalog::default()
        };
        assert!(catalog.validate().is_err());
    }
}
