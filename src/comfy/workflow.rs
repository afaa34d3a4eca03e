use crate::models::GenerationRequest;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const LATENT_NODE: &str = "5";
const PROMPT_NODE: &str = "6";
const SCHEDULER_NODE: &str = "17";
const NOISE_NODE: &str = "25";

pub const DEFAULT_NOISE_SEED: u64 = 479_620_788_394_986;

/// Flux schnell text-to-image graph. Only the latent size, prompt text, step
/// count and noise seed are ever patched.
static BASE_WORKFLOW: Lazy<Value> = Lazy::new(|| {
    json!({
        "5": {
            "inputs": { "width": 1280, "height": 720, "batch_size": 1 },
            "class_type": "EmptyLatentImage",
            "_meta": { "title": "Empty Latent Image" }
        },
        "6": {
            "inputs": { "text": "", "clip": ["11", 0] },
            "class_type": "CLIPTextEncode",
            "_meta": { "title": "CLIP Text Encode" }
        },
        "8": {
            "inputs": { "samples": ["13", 0], "vae": ["10", 0] },
            "class_type": "VAEDecode",
            "_meta": { "title": "VAE Decode" }
        },
        "9": {
            "inputs": { "filename_prefix": "ComfyUI", "images": ["8", 0] },
            "class_type": "SaveImage",
            "_meta": { "title": "Save Image" }
        },
        "10": {
            "inputs": { "vae_name": "ae.safetensors" },
            "class_type": "VAELoader",
            "_meta": { "title": "Load VAE" }
        },
        "11": {
            "inputs": {
                "clip_name1": "t5xxl_fp8_e4m3fn.safetensors",
                "clip_name2": "clip_l.safetensors",
                "type": "flux",
                "device": "default"
            },
            "class_type": "DualCLIPLoader",
            "_meta": { "title": "DualCLIPLoader" }
        },
        "12": {
            "inputs": { "unet_name": "flux1-schnell.safetensors", "weight_dtype": "default" },
            "class_type": "UNETLoader",
            "_meta": { "title": "Load Diffusion Model" }
        },
        "13": {
            "inputs": {
                "noise": ["25", 0],
                "guider": ["22", 0],
                "sampler": ["16", 0],
                "sigmas": ["17", 0],
                "latent_image": ["5", 0]
            },
            "class_type": "SamplerCustomAdvanced",
            "_meta": { "title": "SamplerCustomAdvanced" }
        },
        "16": {
            "inputs": { "sampler_name": "euler" },
            "class_type": "KSamplerSelect",
            "_meta": { "title": "KSamplerSelect" }
        },
        "17": {
            "inputs": { "scheduler": "normal", "steps": 20, "denoise": 1, "model": ["12", 0] },
            "class_type": "BasicScheduler",
            "_meta": { "title": "BasicScheduler" }
        },
        "22": {
            "inputs": { "model": ["12", 0], "conditioning": ["6", 0] },
            "class_type": "BasicGuider",
            "_meta": { "title": "BasicGuider" }
        },
        "25": {
            "inputs": { "noise_seed": DEFAULT_NOISE_SEED },
            "class_type": "RandomNoise",
            "_meta": { "title": "RandomNoise" }
        }
    })
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph(Value);

impl WorkflowGraph {
    pub fn template() -> Self {
        WorkflowGraph(BASE_WORKFLOW.clone())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn input(&self, node: &str, field: &str) -> Option<&Value> {
        self.0.get(node)?.get("inputs")?.get(field)
    }

    pub fn width(&self) -> Option<u64> {
        self.input(LATENT_NODE, "width").and_then(Value::as_u64)
    }

    pub fn height(&self) -> Option<u64> {
        self.input(LATENT_NODE, "height").and_then(Value::as_u64)
    }

    pub fn prompt(&self) -> Option<&str> {
        self.input(PROMPT_NODE, "text").and_then(Value::as_str)
    }

    pub fn steps(&self) -> Option<u64> {
        self.input(SCHEDULER_NODE, "steps").and_then(Value::as_u64)
    }

    pub fn seed(&self) -> Option<u64> {
        self.input(NOISE_NODE, "noise_seed").and_then(Value::as_u64)
    }

    pub fn set_input(&mut self, node: &str, field: &str, value: impl Into<Value>) -> bool {
        match self.0.get_mut(node).and_then(|n| n.get_mut("inputs")) {
            Some(Value::Object(inputs)) => {
                inputs.insert(field.to_string(), value.into());
                true
            }
            _ => false,
        }
    }
}

/// Materializes the request graph for one generation. Ranges are the
/// caller's responsibility. Without a seed the template default is kept.
pub fn build_request(params: &GenerationRequest) -> WorkflowGraph {
    let mut graph = WorkflowGraph::template();
    graph.set_input(LATENT_NODE, "width", params.width);
    graph.set_input(LATENT_NODE, "height", params.height);
    graph.set_input(PROMPT_NODE, "text", params.prompt.as_str());
    graph.set_input(SCHEDULER_NODE, "steps", params.steps);
    if let Some(seed) = params.seed {
        graph.set_input(NOISE_NODE, "noise_seed", seed);
    }
    graph
}
