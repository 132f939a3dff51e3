use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::models::{KnowledgeFile, MAX_KNOWLEDGE_FILES, SessionSettings, UpdateSettingsRequest};

use super::{Store, StoreError};

const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash";
const DEFAULT_TEMPERATURE: f64 = 1.0;

const MIN_TEMPERATURE: f64 = 0.0;
const MAX_TEMPERATURE: f64 = 2.0;

pub fn default_session_settings() -> SessionSettings {
    SessionSettings {
        model_name: DEFAULT_MODEL_NAME.to_string(),
        temperature: DEFAULT_TEMPERATURE,
        system_instruction: String::new(),
        knowledge: Vec::new(),
    }
}

fn clamp_temperature(value: f64) -> f64 {
    value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

/// Field-wise merge of a partial update over the current settings. Temperature
/// is clamped into [0, 2]; an update carrying more than ten knowledge files is
/// rejected wholesale, leaving the stored settings untouched.
pub fn merged_settings(
    current: SessionSettings,
    update: UpdateSettingsRequest,
) -> Result<SessionSettings, StoreError> {
    if let Some(knowledge) = &update.knowledge_files
        && knowledge.len() > MAX_KNOWLEDGE_FILES
    {
        return Err(StoreError::TooManyKnowledgeFiles(MAX_KNOWLEDGE_FILES));
    }

    Ok(SessionSettings {
        model_name: update.model_name.unwrap_or(current.model_name),
        temperature: clamp_temperature(update.temperature.unwrap_or(current.temperature)),
        system_instruction: update
            .system_instruction
            .unwrap_or(current.system_instruction),
        knowledge: update.knowledge_files.unwrap_or(current.knowledge),
    })
}

impl Store {
    pub async fn get_or_create_settings(
        &self,
        session_id: Uuid,
    ) -> Result<SessionSettings, StoreError> {
        if let Some(row) = sqlx::query(
            "SELECT model_name, temperature, system_instruction, knowledge
             FROM session_settings
             WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        {
            return row_to_settings(&row);
        }

        let defaults = default_session_settings();
        self.write_settings(session_id, &defaults).await?;
        Ok(defaults)
    }

    pub async fn merge_settings(
        &self,
        session_id: Uuid,
        update: UpdateSettingsRequest,
    ) -> Result<SessionSettings, StoreError> {
        let current = self.get_or_create_settings(session_id).await?;
        let merged = merged_settings(current, update)?;
        self.write_settings(session_id, &merged).await?;
        Ok(merged)
    }

    async fn write_settings(
        &self,
        session_id: Uuid,
        settings: &SessionSettings,
    ) -> Result<(), StoreError> {
        let knowledge = serde_json::to_value(&settings.knowledge)
            .map_err(|err| StoreError::InvalidData(format!("knowledge not serializable: {err}")))?;

        sqlx::query(
            "INSERT INTO session_settings (
                session_id,
                model_name,
                temperature,
                system_instruction,
                knowledge
             ) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (session_id)
             DO UPDATE SET
               model_name = EXCLUDED.model_name,
               temperature = EXCLUDED.temperature,
               system_instruction = EXCLUDED.system_instruction,
               knowledge = EXCLUDED.knowledge,
               updated_at = NOW()",
        )
        .bind(session_id)
        .bind(&settings.model_name)
        .bind(settings.temperature)
        .bind(&settings.system_instruction)
        .bind(knowledge)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_settings(row: &sqlx::postgres::PgRow) -> Result<SessionSettings, StoreError> {
    let knowledge_value: Value = row.try_get("knowledge")?;
    let knowledge: Vec<KnowledgeFile> = serde_json::from_value(knowledge_value)
        .map_err(|err| StoreError::InvalidData(format!("knowledge invalid: {err}")))?;

    Ok(SessionSettings {
        model_name: row.try_get("model_name")?,
        temperature: row.try_get("temperature")?,
        system_instruction: row.try_get("system_instruction")?,
        knowledge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knowledge_files(count: usize) -> Vec<KnowledgeFile> {
        (0..count)
            .map(|index| KnowledgeFile {
                name: format!("file-{index}.txt"),
                content: "text".to_string(),
            })
            .collect()
    }

    #[test]
    fn merge_keeps_stored_values_for_unset_fields() {
        let current = SessionSettings {
            model_name: "stored-model".to_string(),
            temperature: 0.5,
            system_instruction: "be terse".to_string(),
            knowledge: knowledge_files(2),
        };

        let merged = merged_settings(
            current.clone(),
            UpdateSettingsRequest {
                temperature: Some(0.9),
                ..UpdateSettingsRequest::default()
            },
        )
        .expect("merge should succeed");

        assert_eq!(merged.model_name, "stored-model");
        assert_eq!(merged.temperature, 0.9);
        assert_eq!(merged.system_instruction, "be terse");
        assert_eq!(merged.knowledge, current.knowledge);
    }

    #[test]
    fn merge_clamps_temperature_into_range() {
        let high = merged_settings(
            default_session_settings(),
            UpdateSettingsRequest {
                temperature: Some(3.7),
                ..UpdateSettingsRequest::default()
            },
        )
        .expect("merge should succeed");
        assert_eq!(high.temperature, 2.0);

        let low = merged_settings(
            default_session_settings(),
            UpdateSettingsRequest {
                temperature: Some(-1.0),
                ..UpdateSettingsRequest::default()
            },
        )
        .expect("merge should succeed");
        assert_eq!(low.temperature, 0.0);
    }

    #[test]
    fn merge_rejects_more_than_ten_knowledge_files() {
        let mut current = default_session_settings();
        current.knowledge = knowledge_files(10);

        let err = merged_settings(
            current.clone(),
            UpdateSettingsRequest {
                knowledge_files: Some(knowledge_files(11)),
                ..UpdateSettingsRequest::default()
            },
        )
        .expect_err("eleven knowledge files should be rejected");

        assert!(matches!(err, StoreError::TooManyKnowledgeFiles(10)));
        // The rejected update leaves the stored list untouched.
        assert!(current.knowledge.len() <= MAX_KNOWLEDGE_FILES);
    }

    #[test]
    fn merge_accepts_exactly_ten_knowledge_files() {
        let merged = merged_settings(
            default_session_settings(),
            UpdateSettingsRequest {
                knowledge_files: Some(knowledge_files(10)),
                ..UpdateSettingsRequest::default()
            },
        )
        .expect("ten knowledge files should be accepted");

        assert_eq!(merged.knowledge.len(), 10);
    }
}
