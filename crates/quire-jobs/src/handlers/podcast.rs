use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument};

use quire_core::{JobArgs, JobKind, JobOutput, PodcastGenerator};

use crate::handler::{mismatched_args, JobContext, JobHandler, JobResult};
use crate::handlers::{finish_single_call, run_single_call};

/// Generates one podcast episode.
pub struct GeneratePodcastEpisodeHandler {
    generator: Arc<dyn PodcastGenerator>,
    timeout: Duration,
}

impl GeneratePodcastEpisodeHandler {
    pub fn new(generator: Arc<dyn PodcastGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }
}

#[async_trait]
impl JobHandler for GeneratePodcastEpisodeHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::GeneratePodcastEpisode
    }

    #[instrument(
        skip(self, ctx),
        fields(subsystem = "jobs", component = "generate_podcast_episode", op = "execute", job_id = %ctx.job_id())
    )]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let args = match ctx.args() {
            JobArgs::GeneratePodcastEpisode(args) => args.clone(),
            other => return mismatched_args(self.job_kind(), other),
        };

        match run_single_call(&ctx, self.timeout, self.generator.generate(&args)).await {
            Ok(artifact) => {
                info!(
                    episode_id = %artifact.episode_id,
                    episode_config_id = %args.episode_config_id,
                    "Episode generated"
                );
                finish_single_call(&ctx, JobOutput::PodcastEpisode(artifact)).await
            }
            Err(result) => result,
        }
    }
}
