//! Natural-language summaries of highlight reels.

use std::path::Path;

use async_trait::async_trait;

use crate::error::PipelineResult;

/// Instructions sent with every highlight reel.
pub const ANOMALY_PROMPT: &str = "\
You will receive a video input where abnormal events are marked with red bounding boxes. \
These events should be described in plain, non-technical language, without mentioning any \
detection methods, models, or technical terms such as \"optical flow\", \"tracking\", or \
specific algorithms.

Your task is to identify and describe each unusual or abnormal event using everyday language \
that a general audience can easily understand.

Instructions:
1. Use the timestamp or timestamp range shown in the video. Each timestamp marks a separate \
anomaly and should be addressed individually.

2. For each timestamp:
- Clearly describe the behavior or action taking place within the red bounding box.
- Explain why the behavior appears unusual, unexpected, unsafe, or out of place, based on \
common sense or typical social and situational norms.
- Avoid technical explanations. Focus on real-world logic, safety, and everyday expectations.

3. Tone and style:
- Keep the language natural, concise, and descriptive, as if writing for a safety or incident report.
- Avoid introductory or filler statements.
- Do not speculate beyond what is visually evident in the video.

4. Format:
- Begin each entry with the timestamp or timestamp range in square brackets \
(e.g., [00:01:12 - 00:01:18]).
- Follow with a brief paragraph describing what happens and why it is considered abnormal.

Example Output:
[00:01:00 - 00:01:05] A person is riding a bicycle while holding an umbrella. This reduces \
visibility and balance, making it risky and unexpected behavior, especially in a busy area.

[00:02:14] One individual suddenly sprints through a calm crowd where everyone else is walking \
slowly. The abrupt motion draws attention and feels out of place in the otherwise steady scene.
";

/// Generative summary collaborator.
///
/// Failures are reported as [`crate::PipelineError::Collaborator`] and are
/// never retried by the pipeline.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Upload `video` and return the model's description of it.
    async fn summarize(&self, video: &Path, prompt: &str) -> PipelineResult<String>;

    fn name(&self) -> &'static str;
}
