/// Datacenter naming fallback chain: `consumeDC`/`produceDC` take
/// precedence, falling back to `dc_name`, else `"datacenter1"`.
#[derive(Debug, Clone)]
pub struct DatacenterConfig {
    pub consume_dc: Option<String>,
    pub produce_dc: Option<String>,
    pub dc_name: Option<String>,
}

impl DatacenterConfig {
    pub fn consume_dc(&self) -> String {
        self.consume_dc
            .clone()
            .or_else(|| self.dc_name.clone())
            .unwrap_or_else(|| "datacenter1".to_string())
    }

    pub fn produce_dc(&self) -> String {
        self.produce_dc
            .clone()
            .or_else(|| self.dc_name.clone())
            .unwrap_or_else(|| "datacenter1".to_string())
    }
}

/// `<consume_dc>.<source_topic>`.
pub fn source_topic(consume_dc: &str, topic: &str) -> String {
    format!("{consume_dc}.{topic}")
}
