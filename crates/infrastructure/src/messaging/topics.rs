use domain::Channel;

/// Topic layout of one node: `{prefix}/{device_id}/{channel}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
    device_id: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>, device_id: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            device_id: device_id.into(),
        }
    }

    pub fn topic(&self, channel: Channel) -> String {
        format!("{}/{}/{}", self.prefix, self.device_id, channel.as_str())
    }

    /// Reverse lookup of an inbound topic; `None` for topics of other nodes.
    pub fn channel_of(&self, topic: &str) -> Option<Channel> {
        let rest = topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')?
            .strip_prefix(self.device_id.as_str())?
            .strip_prefix('/')?;
        [
            Channel::Telemetry,
            Channel::Status,
            Channel::Control,
            Channel::Config,
            Channel::Images,
        ]
        .into_iter()
        .find(|channel| channel.as_str() == rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_layout() {
        let topics = Topics::new("imperium/devices/", "node-01");
        assert_eq!(topics.topic(Channel::Telemetry), "imperium/devices/node-01/telemetry");
        assert_eq!(topics.topic(Channel::Images), "imperium/devices/node-01/images");
    }

    #[test]
    fn test_channel_of() {
        let topics = Topics::new("imperium/devices", "node-01");
        assert_eq!(
            topics.channel_of("imperium/devices/node-01/control"),
            Some(Channel::Control)
        );
        assert_eq!(topics.channel_of("imperium/devices/node-02/control"), None);
        assert_eq!(topics.channel_of("imperium/devices/node-01/reboot"), None);
        assert_eq!(topics.channel_of("other/node-01/config"), None);
    }
}
