use std::str::FromStr;

use super::RouteError;
use crate::define::ServerType;

/// 客户端消息主题：`服务/消息名` 或 `服务/消息名/消息ID`
///
/// 带消息ID的请求需要回复。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub service: ServerType,
    pub handler: String,
    pub msg_id: Option<String>,
}

impl Topic {
    pub fn expects_reply(&self) -> bool {
        self.msg_id.is_some()
    }
}

impl FromStr for Topic {
    type Err = RouteError;

    fn from_str(topic: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = topic.split('/').collect();
        let (service, handler, msg_id) = match parts.as_slice() {
            [service, handler] => (*service, *handler, None),
            [service, handler, msg_id] => (*service, *handler, Some(msg_id.to_string())),
            _ => return Err(RouteError::InvalidTopic(topic.to_string())),
        };

        if handler.is_empty() || msg_id.as_deref() == Some("") {
            return Err(RouteError::InvalidTopic(topic.to_string()));
        }

        let service = service
            .parse::<ServerType>()
            .map_err(RouteError::UnknownService)?;

        Ok(Topic {
            service,
            handler: handler.to_string(),
            msg_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topic_with_msg_id_expects_reply() {
        let topic: Topic = "Login/userLogin/42".parse().unwrap();
        assert_eq!(topic.service, ServerType::Login);
        assert_eq!(topic.handler, "userLogin");
        assert_eq!(topic.msg_id.as_deref(), Some("42"));
        assert!(topic.expects_reply());

        let topic: Topic = "Hall/enterRoom".parse().unwrap();
        assert!(!topic.expects_reply());
    }

    #[test]
    fn test_parse_topic_rejects_malformed() {
        for bad in ["Login", "Login/", "Login/userLogin/", "a/b/c/d", ""] {
            assert!(
                matches!(bad.parse::<Topic>(), Err(RouteError::InvalidTopic(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_parse_topic_unknown_service() {
        assert!(matches!(
            "Chat/say".parse::<Topic>(),
            Err(RouteError::UnknownService(name)) if name == "Chat"
        ));
    }
}
