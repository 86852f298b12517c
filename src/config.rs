//! Loading prompt configuration from TOML.
//!
//! See `AppConfig` and `Prompts` for expected schema. All templates have
//! built-in defaults, so the config file is entirely optional.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompt templates used by the Gemini client. Placeholders are filled with
/// `util::fill_template`. You can override them in TOML to tune tone/structure;
/// the parser still expects a numbered list from identification and similars.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// Identification: segments raw PDF text into a numbered exercise list.
  /// Placeholder: {pdf_text}
  pub identify_template: String,
  /// Resolution: step-by-step Markdown solution for one exercise.
  /// Placeholder: {exercise}
  pub resolve_template: String,
  /// Similar generation: new exercises sharing the original's concept.
  /// Placeholders: {quantity}, {exercise}, {solution}
  pub similar_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      identify_template: "\
Dado o seguinte texto extraído de um documento, identifique e extraia todas as questões ou exercícios.\n\
Para cada questão identificada, forneça apenas o texto da questão, sem as soluções ou explicações.\n\
Liste as questões em uma lista numerada.\n\n\
Formato de saída desejado:\n\
1. [Texto da primeira questão]\n\
2. [Texto da segunda questão]\n\
...\n\n\
Se não houver questões claras, responda 'Nenhuma questão encontrada.'.\n\n\
TEXTO:\n---\n{pdf_text}\n---"
        .into(),
      resolve_template: "\
Resolva o seguinte exercício e explique cada passo detalhadamente, como se estivesse ensinando alguém.\n\
Mantenha a resposta clara e focada apenas na resolução e explicação.\n\
**Por favor, formate sua resposta usando Markdown**, incluindo cabeçalhos, listas, negrito, itálico e blocos de código para fórmulas ou cálculos, quando apropriado.\n\n\
Exercício:\n---\n{exercise}\n---\n\n\
Certifique-se de mostrar todos os cálculos e a lógica por trás de cada etapa."
        .into(),
      similar_template: "\
Com base no seguinte exercício e sua resolução, crie {quantity} novos exercícios que abordem o mesmo conceito\n\
ou tipo de problema, mas com valores, cenários ou dados diferentes.\n\
Não inclua as soluções para os novos exercícios.\n\
**Por favor, apresente cada novo exercício como uma lista numerada, formatado em Markdown, com negrito ou itálico para destacar termos importantes.**\n\n\
Exercício Original:\n---\n{exercise}\n---\n\n\
Resolução do Exercício Original (para contexto do conceito):\n---\n{solution}\n---\n\n\
Por favor, formate os novos exercícios da seguinte forma em Markdown:\n\
1. [Texto do Exercício Similar 1, com Markdown]\n\
2. [Texto do Exercício Similar 2, com Markdown]\n\
..."
        .into(),
    }
  }
}

/// Attempt to load `AppConfig` from PROMPTS_CONFIG_PATH. On any parsing/IO
/// error, returns None and the built-in defaults apply.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("PROMPTS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "estudai_backend", %path, "Loaded prompts config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "estudai_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "estudai_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::fill_template;

  #[test]
  fn default_templates_carry_their_placeholders() {
    let p = Prompts::default();
    assert!(p.identify_template.contains("{pdf_text}"));
    assert!(p.resolve_template.contains("{exercise}"));
    for key in ["{quantity}", "{exercise}", "{solution}"] {
      assert!(p.similar_template.contains(key));
    }
  }

  #[test]
  fn partial_toml_override_keeps_other_defaults() {
    let cfg: AppConfig =
      toml::from_str("[prompts]\nresolve_template = \"Solve: {exercise}\"\n").unwrap();
    assert_eq!(cfg.prompts.resolve_template, "Solve: {exercise}");
    assert!(cfg.prompts.identify_template.contains("lista numerada"));
    let filled = fill_template(&cfg.prompts.resolve_template, &[("exercise", "2x+5=15")]);
    assert_eq!(filled, "Solve: 2x+5=15");
  }
}
