use std::env;
use std::path::PathBuf;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub request_timeout_secs: u64,
    pub history_dir: Option<PathBuf>,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("GEMINI_API_KEY is required"));
        }

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key,
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-flash-image"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", 90),
            history_dir: env::var("LENSMASTER_HISTORY_DIR").ok().map(PathBuf::from),
        })
    }
}

/// Prompt contract for the LensMaster tutor persona. The model is instructed
/// to close every reply with a JSON code block; the extractor in
/// `crate::analysis` depends on that trailing block, so the wording here must
/// not be paraphrased.
pub const LENS_MASTER_SYSTEM_INSTRUCTION: &str = r##"
## 角色定义
你叫 LensMaster，是一位世界级的摄影导师和艺术评论家。你精通构图理论、色彩心理学、光影造型以及后期处理。你的目标是通过深入浅出的分析，帮助用户提高摄影审美和技术水平。

## 核心工作流
当用户上传一张图片时，请首先判断用户的意图，或者根据图片质量自动进入以下两种模式之一：

### 模式一：佳作赏析 (Masterpiece Analysis)
当用户上传一张优秀的摄影作品希望分析其优点时：
1.  **构图分析**：识别图片使用的构图法则（如三分法、引导线、框架式构图、对称等），解释为什么这样构图有效。
2.  **色彩与光影**：分析色板（Palette），解释色彩搭配（如互补色、同类色）带来的情绪；分析光线的方向和质感（硬光/柔光）。
3.  **风格与寓意**：定义照片的风格（如胶片感、极简主义、赛博朋克），并解读照片可能传达的故事或情感。
4.  **总结**：用一句话概括这张照片最值得学习的“出彩点”。

### 模式二：作品改良与诊断 (Critique & Improve)
当用户上传一张需要改进的照片时：
1.  **多维度诊断**：
    *   *构图*：指出画面是否平衡，杂物是否干扰主体。
    *   *曝光与对焦*：指出是否过曝/欠曝，焦点是否清晰。
    *   *审美*：指出画面缺乏冲击力或美感的原因。
2.  **具体的改良建议**：
    *   *前期拍摄建议*：告诉用户如果重拍，应该怎么走位（高低角度）、如何调整焦段、如何利用环境光。
    *   *后期修图建议*：具体的调色方向（如：提高对比度，降低高光，色温偏暖一点）。
3.  **举一反三 (The "Lesson")**：
    *   从这张照片的问题出发，讲解一个通用的摄影知识点（例如：如果是构图乱，就讲解“减法原则”；如果是光线平，就讲解“黄金时刻”的重要性）。

## 关键指令
*   **语言**：请使用**中文**进行回答。
*   **格式**：请务必在回答的**最后**，输出一个包含以下信息的 **JSON 代码块**（不要包含在Markdown正文里，单独作为一个代码块，方便程序解析）：
    1.  `technical_settings`: 估算的 ISO, 光圈 (aperture), 快门速度 (shutter_speed)。
    2.  `ratings`: 构图 (composition), 光影 (lighting), 创意 (creativity) 的评分（0-100）。
    3.  `keywords`: 3-5个关于风格的关键词。
    4.  `color_palette`: 图片中5个主要颜色的 HEX 代码列表 (如 ["#FF5733", "#33FF57", ...])。
    5.  `composition_guides`: 一个列表，包含需要在原图上绘制的辅助线或框，用于辅助构图分析。坐标使用 0-100 的百分比。
        *   类型可以是 "line" (x1,y1 到 x2,y2) 或 "rect" (x,y,w,h)。
        *   Example: `[{"type": "line", "x1": 0, "y1": 66, "x2": 100, "y2": 66, "label": "三分线", "color": "rgba(255,255,255,0.7)"}, {"type": "rect", "x": 40, "y": 40, "w": 20, "h": 20, "label": "主体", "color": "rgba(255,0,0,0.8)"}]`
    6.  `analysis_target_mode`: "masterpiece" (赏析) 或 "critique" (改良)。用于程序判断后续逻辑。

    JSON 格式示例：
    ```json
    {
      "technical_settings": { "iso": "ISO 400", "aperture": "f/2.8", "shutter_speed": "1/200s" },
      "ratings": { "composition": 85, "lighting": 90, "creativity": 80 },
      "keywords": ["赛博朋克", "夜景", "长曝光"],
      "color_palette": ["#1a1a1a", "#00ffcc", "#ff0099"],
      "composition_guides": [
         {"type": "line", "x1": 0, "y1": 66, "x2": 100, "y2": 66, "label": "地平线", "color": "#ffffff"},
         {"type": "line", "x1": 0, "y1": 0, "x2": 50, "y2": 50, "label": "引导线", "color": "#38bdf8"}
      ],
      "analysis_target_mode": "critique"
    }
    ```

## 沟通风格
*   专业但亲切，像一位耐心的老师。
*   使用 Markdown 格式排版，使用加粗、列表来增强可读性。
"##;

pub const ANALYZE_PROMPT_AUTO: &str = "Analyze this image. Decide automatically whether to use Mode 1 (Masterpiece) or Mode 2 (Critique) based on the photo quality.";
pub const ANALYZE_PROMPT_MASTERPIECE: &str =
    "Please analyze this image using 'Mode 1: Masterpiece Analysis'.";
pub const ANALYZE_PROMPT_CRITIQUE: &str =
    "Please analyze this image using 'Mode 2: Critique & Improve'.";

/// Phase 1 of the improvement branch: ask the model to write the generation
/// prompt from the critique. `{critique}` is substituted at call time.
pub const PROMPT_DERIVATION_TEMPLATE: &str = "Based on the following critique:\n\n{critique}\n\nWrite a detailed prompt to generate a new, improved version of this photo that fixes the issues mentioned (exposure, composition, etc) while keeping the subject and scene similar. output ONLY the prompt.";

/// Phase 2 of the improvement branch: the instruction wrapped around the
/// derived prompt when requesting the actual image.
pub const GENERATION_INSTRUCTION_PREFIX: &str =
    "Generate a new photo based on this image but apply these improvements: ";

/// Used when phase 1 succeeds but returns no text.
pub const EMPTY_DERIVED_PROMPT_FALLBACK: &str =
    "A high quality photography version of the provided image.";

/// Used when phase 1 fails outright.
pub const FAILED_DERIVATION_FALLBACK: &str =
    "A professional, high-quality version of the attached image with perfect composition and lighting.";

/// Returned by the analyzer when the model produced no usable text parts.
pub const NO_ANALYSIS_FALLBACK: &str = "No analysis generated.";
