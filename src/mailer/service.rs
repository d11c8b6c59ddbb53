use std::path::PathBuf;
use std::sync::Arc;

use handlebars::Handlebars;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::error::{ApiError, ApiResult};
use crate::mailer::dto::{MailJob, Recipients};
use crate::mailer::queue::MailQueue;
use crate::mailer::render::{compile_mjml, ValidationLevel};

const DEFAULT_SUBJECT: &str = "No subject";

/// Arguments for [`MailerService::send_templated_email`].
#[derive(Debug)]
pub struct SendTemplatedEmail {
    pub template: String,
    pub variables: Option<Value>,
    pub recipients: Recipients,
    pub subject: Option<String>,
    pub from: Option<String>,
}

/// Renders named MJML templates and enqueues the result as a durable mail
/// job. Success means "durably queued", never "sent".
pub struct MailerService {
    queue: Arc<dyn MailQueue>,
    templates_dir: PathBuf,
    app_name: String,
}

impl MailerService {
    pub fn new(queue: Arc<dyn MailQueue>, templates_dir: impl Into<PathBuf>, app_name: String) -> Self {
        Self {
            queue,
            templates_dir: templates_dir.into(),
            app_name,
        }
    }

    #[instrument(skip(self, opts), fields(template = %opts.template))]
    pub async fn send_templated_email(&self, opts: SendTemplatedEmail) -> ApiResult<()> {
        let tpl_path = self.templates_dir.join(format!("{}.mjml", opts.template));
        if !tpl_path.exists() {
            return Err(ApiError::not_found(format!(
                "Template not found: {}",
                opts.template
            )));
        }
        let fragment = std::fs::read_to_string(&tpl_path)
            .map_err(|e| ApiError::Internal(e.into()))?;

        let variables = opts.variables.clone().unwrap_or_else(|| json!({}));

        let hbs = Handlebars::new();
        let body = hbs
            .render_template(&fragment, &variables)
            .map_err(|e| ApiError::Internal(e.into()))?;

        // Wrap in the shared layout when one exists. The layout sees `body`,
        // every variable, and an `appName` fallback.
        let layout_path = self.templates_dir.join("layout").join("layout.mjml");
        let markup = if layout_path.exists() {
            let layout = std::fs::read_to_string(&layout_path)
                .map_err(|e| ApiError::Internal(e.into()))?;
            let mut data = match &variables {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            data.insert("body".into(), Value::String(body));
            data.entry("appName")
                .or_insert_with(|| Value::String(self.app_name.clone()));
            hbs.render_template(&layout, &Value::Object(data))
                .map_err(|e| ApiError::Internal(e.into()))?
        } else {
            body
        };

        let html = compile_mjml(&markup, ValidationLevel::Soft)?;

        let subject = opts
            .subject
            .filter(|s| !s.is_empty())
            .or_else(|| {
                variables
                    .get("subject")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_SUBJECT.into());

        let job = MailJob {
            to: opts.recipients,
            subject,
            mjml: None,
            html: Some(html),
            variables: opts.variables,
            from: opts.from,
        };

        self.enqueue(&job).await
    }

    /// Lower-level publish primitive.
    pub async fn enqueue(&self, job: &MailJob) -> ApiResult<()> {
        self.queue.publish(job).await.map_err(ApiError::Internal)?;
        debug!(subject = %job.subject, "mail job enqueued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingQueue {
        published: Mutex<Vec<MailJob>>,
    }

    #[async_trait]
    impl MailQueue for RecordingQueue {
        async fn publish(&self, job: &MailJob) -> anyhow::Result<()> {
            self.published.lock().unwrap().push(job.clone());
            Ok(())
        }
    }

    // Standalone document, used when no shared layout is present.
    const WELCOME_DOC: &str = "<mjml><mj-body><mj-section><mj-column>\
<mj-text>Hello {{firstname}}, welcome to {{appName}}!</mj-text>\
</mj-column></mj-section></mj-body></mjml>";

    // Fragment + wrapping layout, the shape the shipped templates use.
    const WELCOME_FRAGMENT: &str = "<mj-section><mj-column>\
<mj-text>Hello {{firstname}}</mj-text></mj-column></mj-section>";
    const LAYOUT: &str = "<mjml><mj-body><mj-section><mj-column>\
<mj-text>{{appName}} header</mj-text></mj-column></mj-section>\
{{{body}}}</mj-body></mjml>";

    fn service_with_templates(
        layout: bool,
    ) -> (Arc<RecordingQueue>, MailerService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        if layout {
            std::fs::write(dir.path().join("welcome.mjml"), WELCOME_FRAGMENT).unwrap();
            std::fs::create_dir_all(dir.path().join("layout")).unwrap();
            std::fs::write(dir.path().join("layout").join("layout.mjml"), LAYOUT).unwrap();
        } else {
            std::fs::write(dir.path().join("welcome.mjml"), WELCOME_DOC).unwrap();
        }
        let queue = Arc::new(RecordingQueue::default());
        let service = MailerService::new(
            queue.clone(),
            dir.path().to_path_buf(),
            "Luxestay".to_string(),
        );
        (queue, service, dir)
    }

    fn opts() -> SendTemplatedEmail {
        SendTemplatedEmail {
            template: "welcome".into(),
            variables: Some(json!({ "firstname": "Ada", "appName": "Luxestay" })),
            recipients: Recipients::One("a@x.com".into()),
            subject: Some("Welcome to Luxestay".into()),
            from: None,
        }
    }

    #[tokio::test]
    async fn missing_template_fails_before_publish() {
        let (queue, service, _dir) = service_with_templates(false);
        let err = service
            .send_templated_email(SendTemplatedEmail {
                template: "does-not-exist".into(),
                ..opts()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(queue.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publishes_one_job_with_substituted_variables() {
        let (queue, service, _dir) = service_with_templates(false);
        service.send_templated_email(opts()).await.unwrap();

        let published = queue.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let job = &published[0];
        assert_eq!(job.subject, "Welcome to Luxestay");
        assert_eq!(job.to.as_vec(), vec!["a@x.com"]);
        let html = job.html.as_deref().unwrap();
        assert!(html.contains("Hello Ada"));
        assert!(job.mjml.is_none());
    }

    #[tokio::test]
    async fn layout_wraps_rendered_fragment() {
        let (queue, service, _dir) = service_with_templates(true);
        service.send_templated_email(opts()).await.unwrap();

        let published = queue.published.lock().unwrap();
        let html = published[0].html.as_deref().unwrap();
        assert!(html.contains("Luxestay header"));
        assert!(html.contains("Hello Ada"));
    }

    #[tokio::test]
    async fn subject_falls_back_to_variables_then_default() {
        let (queue, service, _dir) = service_with_templates(false);
        service
            .send_templated_email(SendTemplatedEmail {
                subject: None,
                variables: Some(json!({ "firstname": "Ada", "subject": "From vars" })),
                ..opts()
            })
            .await
            .unwrap();
        service
            .send_templated_email(SendTemplatedEmail {
                subject: None,
                variables: Some(json!({ "firstname": "Ada" })),
                ..opts()
            })
            .await
            .unwrap();

        let published = queue.published.lock().unwrap();
        assert_eq!(published[0].subject, "From vars");
        assert_eq!(published[1].subject, DEFAULT_SUBJECT);
    }
}
