use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use adducation_core::model::{
    EvaluationRequest, InterviewEvaluation, InterviewQuestionRequest, LearningRecommendations,
    LearningRequest, QuizRequest,
};

use crate::app_settings_service::AppSettingsService;
use crate::error::LlmError;
use crate::http::{HttpRequest, HttpTransport};
use crate::llm::config::LlmConfig;
use crate::llm::parser::{ParsedQuiz, greedy_json_object, parse_quiz_questions};

const QUIZ_SYSTEM_PROMPT: &str =
    "You are an expert educator creating quiz questions for job seekers.";
const INTERVIEWER_SYSTEM_PROMPT: &str =
    "You are an expert interviewer helping job seekers practice for interviews.";
const EVALUATOR_SYSTEM_PROMPT: &str =
    "You are an expert interviewer providing constructive feedback. Always respond with valid JSON.";
const LEARNING_SYSTEM_PROMPT: &str =
    "You are an expert educator creating personalized learning content. Always respond with valid JSON.";

/// One entry of the provider's model catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub context_length: Option<u64>,
    pub is_free: bool,
}

impl ModelInfo {
    /// Minimal description of a model id without asking the provider.
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        let name = id.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(id);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            context_length: None,
            is_free: id.contains("free"),
        }
    }
}

/// OpenRouter-compatible chat completion client for the learning features.
#[derive(Clone)]
pub struct LlmGateway {
    config: LlmConfig,
    transport: Arc<dyn HttpTransport>,
    settings: AppSettingsService,
}

impl LlmGateway {
    #[must_use]
    pub fn new(
        config: LlmConfig,
        transport: Arc<dyn HttpTransport>,
        settings: AppSettingsService,
    ) -> Self {
        Self {
            config,
            transport,
            settings,
        }
    }

    /// Stored key, else the configured default.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Settings` if local storage cannot be read.
    pub async fn api_key(&self) -> Result<Option<String>, LlmError> {
        let settings = self.settings.load().await?;
        Ok(settings
            .api_key()
            .map(str::to_string)
            .or_else(|| self.config.default_api_key.clone()))
    }

    /// # Errors
    ///
    /// Returns `LlmError::Settings` if local storage cannot be written.
    pub async fn set_api_key(&self, api_key: &str) -> Result<(), LlmError> {
        self.settings.set_api_key(api_key).await?;
        Ok(())
    }

    /// Stored model choice, else the configured default.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Settings` if local storage cannot be read.
    pub async fn selected_model(&self) -> Result<String, LlmError> {
        let settings = self.settings.load().await?;
        Ok(settings
            .selected_model()
            .map_or_else(|| self.config.default_model.clone(), str::to_string))
    }

    /// # Errors
    ///
    /// Returns `LlmError::Settings` for malformed ids or storage failures.
    pub async fn set_selected_model(&self, model_id: &str) -> Result<(), LlmError> {
        self.settings.set_selected_model(model_id).await?;
        Ok(())
    }

    /// Fetch the provider's model catalog and tag free models.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` when no key is configured or the request fails.
    pub async fn available_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let api_key = self.require_api_key().await?;
        let request = HttpRequest::get(self.config.endpoint("models")).bearer(api_key);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(status = %response.status, "failed to fetch model catalog");
            return Err(LlmError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }

        let catalog: ModelCatalog = serde_json::from_str(&response.body)
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
        let models: Vec<ModelInfo> = catalog
            .data
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<CatalogEntry>(entry).ok())
            .map(CatalogEntry::into_info)
            .collect();
        debug!(count = models.len(), "model catalog fetched");
        Ok(models)
    }

    /// Describe a model id, defaulting to the selected model when empty.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Settings` if the selected model cannot be read.
    pub async fn model_info(&self, model_id: &str) -> Result<ModelInfo, LlmError> {
        let id = if model_id.trim().is_empty() {
            self.selected_model().await?
        } else {
            model_id.trim().to_string()
        };
        Ok(ModelInfo::from_id(&id))
    }

    /// Ask the model for multiple-choice questions and recover them from
    /// whatever shape the reply takes.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` before any request when no key is
    /// set, request-level errors, or `LlmError::Unparseable` when every
    /// recovery stage fails.
    pub async fn generate_quiz_questions(
        &self,
        request: &QuizRequest,
    ) -> Result<ParsedQuiz, LlmError> {
        let prompt = format!(
            "Generate {count} multiple-choice quiz questions about {topic} at {difficulty} level.\n\n\
             Return ONLY valid JSON in this exact format:\n\
             {{\n  \"questions\": [\n    {{\n      \"question\": \"Question text here\",\n      \
             \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],\n      \
             \"correct_answer\": 0,\n      \"explanation\": \"Why this answer is correct\"\n    }}\n  ]\n}}\n\n\
             Make questions relevant for job seekers and career development.",
            count = request.question_count,
            topic = request.topic,
            difficulty = request.difficulty.as_str(),
        );
        info!(topic = %request.topic, count = request.question_count, "generating quiz questions");

        let model = self.selected_model().await?;
        let content = self
            .chat(&model, QUIZ_SYSTEM_PROMPT, &prompt, Some(0.7), 1000)
            .await?;
        let parsed = parse_quiz_questions(&content).inspect_err(|_| {
            warn!(model = %model, "no quiz questions could be recovered from reply");
        })?;
        info!(stage = %parsed.stage, count = parsed.questions.len(), "quiz questions parsed");
        Ok(parsed)
    }

    /// One interview question as plain text.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` when no key is set or the request fails.
    pub async fn generate_interview_question(
        &self,
        request: &InterviewQuestionRequest,
    ) -> Result<String, LlmError> {
        let prompt = format!(
            "Generate a {difficulty} level interview question for a {role} position focusing on these skills: {skills}. \
             Make it realistic and commonly asked.",
            difficulty = request.difficulty.as_str(),
            role = request.job_role,
            skills = request.skills.join(", "),
        );
        let model = self.selected_model().await?;
        self.chat(&model, INTERVIEWER_SYSTEM_PROMPT, &prompt, None, 500)
            .await
    }

    /// Score an answer. Once the model replies, some evaluation is always
    /// returned; unreadable replies become a neutral fallback.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` only when no key is set or the request fails.
    pub async fn evaluate_interview_response(
        &self,
        request: &EvaluationRequest,
    ) -> Result<InterviewEvaluation, LlmError> {
        let prompt = format!(
            "Evaluate this interview response for a {role} position:\n\n\
             Question: {question}\n\
             Response: {response}\n\n\
             Provide feedback in JSON format:\n\
             {{\n  \"score\": [1-10],\n  \"strengths\": [\"strength1\", \"strength2\"],\n  \
             \"improvements\": [\"improvement1\", \"improvement2\"],\n  \
             \"overall_feedback\": \"detailed feedback\"\n}}",
            role = request.job_role,
            question = request.question,
            response = request.response,
        );
        let model = match request.model_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.selected_model().await?,
        };

        let content = self
            .chat(&model, EVALUATOR_SYSTEM_PROMPT, &prompt, None, 800)
            .await?;
        let evaluation = greedy_json_object(&content)
            .and_then(|raw| serde_json::from_str::<InterviewEvaluation>(raw).ok())
            .unwrap_or_else(|| {
                warn!("interview evaluation was not valid JSON; using fallback");
                InterviewEvaluation::fallback(&content)
            });
        Ok(evaluation)
    }

    /// Personalized recommendations, or a generic list when the reply
    /// cannot be read.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` only when no key is set or the request fails.
    pub async fn generate_learning_content(
        &self,
        request: &LearningRequest,
    ) -> Result<LearningRecommendations, LlmError> {
        let prompt = format!(
            "Create personalized learning recommendations for: {goal}\n\n\
             User Profile:\n\
             - Level: {level}\n\
             - Skills: {skills}\n\
             - Topic: {topic}\n\n\
             Provide 5-8 specific, actionable recommendations in JSON format:\n\
             {{\n  \"recommendations\": [\n    \"Take an online course on [specific skill]\",\n    \
             \"Practice [specific skill] by building projects\",\n    \
             \"Join [specific community] for networking\"\n  ]\n}}",
            goal = request.goal,
            level = request.user_level,
            skills = request.skills.join(", "),
            topic = request.topic,
        );
        let model = self.selected_model().await?;

        let content = self
            .chat(&model, LEARNING_SYSTEM_PROMPT, &prompt, None, 1000)
            .await?;
        let recommendations = greedy_json_object(&content)
            .and_then(|raw| serde_json::from_str::<LearningRecommendations>(raw).ok())
            .filter(|parsed| !parsed.is_empty())
            .unwrap_or_else(|| {
                warn!("learning content was not valid JSON; using generic recommendations");
                LearningRecommendations::fallback()
            });
        Ok(recommendations)
    }

    async fn require_api_key(&self) -> Result<String, LlmError> {
        self.api_key()
            .await?
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: Option<f32>,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let api_key = self.require_api_key().await?;

        let payload = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };
        let body = serde_json::to_value(&payload)
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;

        let request = HttpRequest::post(self.config.endpoint("chat/completions"))
            .bearer(api_key)
            .header("HTTP-Referer", self.config.referer.clone())
            .header("X-Title", self.config.title.clone())
            .json(body);
        debug!(model, max_tokens, "sending chat completion");

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(status = %response.status, model, "chat completion failed");
            return Err(LlmError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }

        let body: ChatResponse = serde_json::from_str(&response.body)
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelCatalog {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    name: Option<String>,
    description: Option<String>,
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<Value>,
}

impl CatalogEntry {
    fn into_info(self) -> ModelInfo {
        let free_price = prompt_price_is_zero(self.pricing.as_ref());
        let is_free = self.id.contains("free") || free_price;
        ModelInfo {
            name: self.name.filter(|n| !n.is_empty()).unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            context_length: self.context_length,
            is_free,
        }
    }
}

/// A missing prompt price counts as zero; an unreadable one does not.
fn prompt_price_is_zero(pricing: Option<&Value>) -> bool {
    match pricing.and_then(|p| p.get("prompt")) {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().is_ok_and(|price| price == 0.0),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_price_classification() {
        assert!(prompt_price_is_zero(None));
        assert!(prompt_price_is_zero(Some(&json!({}))));
        assert!(prompt_price_is_zero(Some(&json!({"prompt": 0}))));
        assert!(prompt_price_is_zero(Some(&json!({"prompt": "0"}))));
        assert!(prompt_price_is_zero(Some(&json!({"prompt": "0.000"}))));
        assert!(!prompt_price_is_zero(Some(&json!({"prompt": "0.0000015"}))));
        assert!(!prompt_price_is_zero(Some(&json!({"prompt": 0.25}))));
        assert!(!prompt_price_is_zero(Some(&json!({"prompt": "n/a"}))));
    }

    #[test]
    fn model_info_uses_last_path_segment() {
        let info = ModelInfo::from_id("meta-llama/llama-3-8b-instruct:free");
        assert_eq!(info.name, "llama-3-8b-instruct:free");
        assert!(info.is_free);
        assert_eq!(ModelInfo::from_id("local").name, "local");
    }

    #[test]
    fn chat_request_omits_unset_temperature() {
        let request = ChatRequest {
            model: "m",
            messages: vec![],
            temperature: None,
            max_tokens: 500,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert_eq!(value["max_tokens"], 500);
    }
}
