// RouterOS console noise removal.
//
// Runs on raw output before any MikroTik parser sees it.

use async_trait::async_trait;
use tracing::debug;

use crate::error::CoreError;
use crate::model::OutputData;
use crate::platform::Platform;
use crate::plugin::{Applicability, OutputContext, OutputPlugin};

const PAGER_HINT: &str = "[Q quit|D dump|C-z pause]";

fn is_prompt(line: &str) -> bool {
    let line = line.trim();
    ((line.starts_with('[') || line.starts_with('@')) && line.ends_with("] >"))
        || (line.starts_with('[') && line.contains("] > "))
}

/// Drop prompts, the pager hint and the `Flags:` legend.
///
/// The legend may wrap over several lines; it ends at the first line carrying
/// a `key=value` pair.
pub fn clean(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let mut in_legend = false;
    raw.lines()
        .filter(|line| {
            let trimmed = line.trim();
            if is_prompt(trimmed) || trimmed.contains(PAGER_HINT) {
                return false;
            }
            if trimmed.starts_with("Flags:") {
                in_legend = true;
                return false;
            }
            if in_legend {
                if trimmed.contains('=') {
                    in_legend = false;
                } else {
                    return false;
                }
            }
            true
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default)]
pub struct MikrotikGarbage;

#[async_trait]
impl OutputPlugin for MikrotikGarbage {
    fn name(&self) -> &str {
        "mikrotik_garbage"
    }

    fn applicability(&self) -> Applicability {
        Applicability::platforms(&[Platform::MikrotikRouteros, Platform::MikrotikSwitchos])
    }

    fn builtin(&self) -> bool {
        true
    }

    async fn process(
        &self,
        _ctx: &OutputContext<'_>,
        output: OutputData,
    ) -> Result<OutputData, CoreError> {
        match output {
            OutputData::Raw(outputs) => {
                debug!(plugin = self.name(), blocks = outputs.len(), "cleaning RouterOS output");
                Ok(OutputData::Raw(outputs.iter().map(|o| clean(o)).collect()))
            }
            structured => Ok(structured),
        }
    }
}
