//! Export container and stream tags as an ffmetadata side-file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fp_core::Result;

use super::{ffmpeg, input_args};
use crate::command::Command;
use crate::plugin::{JobContext, Plugin};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataPlugin;

impl MetadataPlugin {
    pub const NAME: &'static str = "metadata";
    pub const COMMAND: &'static str = "metadata.export";

    pub(crate) fn construct(_table: &toml::Table) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self))
    }
}

impl Plugin for MetadataPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn assets(&self, ctx: &JobContext<'_>) -> BTreeMap<String, PathBuf> {
        BTreeMap::from([("metadata".to_string(), ctx.output_path("metadata.txt"))])
    }

    fn commands(&self, ctx: &JobContext<'_>) -> Result<Vec<Command>> {
        let output = ctx.output_path("metadata.txt");
        let args = input_args(ctx.source)
            .opt("f", "ffmetadata")
            .trailing(output.to_string_lossy());
        Ok(vec![ffmpeg(Self::COMMAND)
            .with_args(args)
            .output(output)
            .priority(20)])
    }
}
