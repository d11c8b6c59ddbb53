use serde::{Deserialize, Serialize};

/// One address or several; serialized untagged so the queue format matches
/// producers that send either a string or an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            Recipients::One(addr) => vec![addr.clone()],
            Recipients::Many(addrs) => addrs.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Recipients::One(addr) => addr.is_empty(),
            Recipients::Many(addrs) => addrs.is_empty() || addrs.iter().all(String::is_empty),
        }
    }
}

/// Serialized unit of deferred email work placed on the queue. At least one
/// of `mjml` and `html` must resolve to final HTML before send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailJob {
    pub to: Recipients,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mjml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_deserialize_from_string_or_array() {
        let job: MailJob =
            serde_json::from_str(r#"{"to":"a@x.com","subject":"Hi","html":"<p>x</p>"}"#).unwrap();
        assert_eq!(job.to.as_vec(), vec!["a@x.com"]);

        let job: MailJob =
            serde_json::from_str(r#"{"to":["a@x.com","b@x.com"],"subject":"Hi"}"#).unwrap();
        assert_eq!(job.to.as_vec(), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let job = MailJob {
            to: Recipients::One("a@x.com".into()),
            subject: "Hi".into(),
            mjml: None,
            html: Some("<p>x</p>".into()),
            variables: None,
            from: None,
        };
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("mjml").is_none());
        assert!(json.get("from").is_none());
        assert_eq!(json["to"], "a@x.com");
    }

    #[test]
    fn empty_recipients_detected() {
        assert!(Recipients::Many(vec![]).is_empty());
        assert!(Recipients::One(String::new()).is_empty());
        assert!(!Recipients::One("a@x.com".into()).is_empty());
    }
}
