//! Category catalog and prompt resolution.
//!
//! Every catalog prompt is the shared [`PHOTO_RULES`] block followed by a
//! scene description. The rest of the service treats prompts as opaque text.

/// Realism rules prepended to every catalog scene.
pub const PHOTO_RULES: &str = "Generate a single, cohesive, photorealistic image that looks like it was captured naturally on a modern smartphone camera.

The person and the environment must feel like they belong in the same scene, with consistent lighting direction, realistic shadows, natural color grading, and correct perspective.

Avoid any \"cut-out\", \"pasted\", or composited appearance. The subject should be naturally integrated into the environment, with soft edge transitions, accurate ambient lighting, and subtle light reflections on skin and clothing.

Use realistic mobile photography characteristics:
– natural daylight or indoor ambient light
– slight depth of field (smartphone portrait style, not studio)
– mild lens imperfections (very subtle noise, natural sharpness)
– authentic skin tones and realistic textures

The final result should look like a real photo taken on a phone, not an AI composite or background replacement.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Beach,
    City,
    Roadtrip,
    Mountain,
    Cafe,
    Sunset,
    Cyberpunk,
    Studio,
    Nature,
    Retro,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Beach,
        Category::City,
        Category::Roadtrip,
        Category::Mountain,
        Category::Cafe,
        Category::Sunset,
        Category::Cyberpunk,
        Category::Studio,
        Category::Nature,
        Category::Retro,
    ];

    pub const DEFAULT: Category = Category::Beach;

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            Category::Beach => "beach",
            Category::City => "city",
            Category::Roadtrip => "roadtrip",
            Category::Mountain => "mountain",
            Category::Cafe => "cafe",
            Category::Sunset => "sunset",
            Category::Cyberpunk => "cyberpunk",
            Category::Studio => "studio",
            Category::Nature => "nature",
            Category::Retro => "retro",
        }
    }

    pub fn scenes(self) -> &'static [&'static str] {
        match self {
            Category::Beach => &[
                "Place this person naturally at a tropical beach paradise with golden sand, crystal blue water, and palm trees. Capture it as a candid vacation moment with warm natural sunlight.",
                "Show this person enjoying a sunset by the ocean, with warm orange and pink colors in the sky reflecting on the water. Natural golden hour lighting.",
                "Create a relaxed beach scene with turquoise water, white sand, and tropical vibes. The person should look naturally placed as if actually there.",
            ],
            Category::City => &[
                "Place this person in an urban cityscape with modern skyscrapers and vibrant city atmosphere. Natural daylight with building shadows.",
                "Show this person exploring a beautiful metropolitan area with iconic buildings. Street photography style with natural ambient lighting.",
                "Create a stylish coffee shop moment in a trendy urban neighborhood. Warm indoor lighting with city view through windows.",
            ],
            Category::Roadtrip => &[
                "Place this person on a scenic highway surrounded by mountains and open skies. Natural outdoor lighting with adventure vibes.",
                "Show this person with a camper van on a beautiful mountain road. Golden hour lighting with travel exploration mood.",
                "Create a classic road trip scene with endless highways and dramatic landscapes. Natural sunlight and travel adventure atmosphere.",
            ],
            Category::Mountain => &[
                "Place this person in a breathtaking mountain setting with snow-capped peaks and alpine scenery. Natural outdoor lighting.",
                "Show this person on a hiking trail with mountain vistas and pine forests. Natural daylight filtering through trees.",
                "Create a serene mountain lake scene with dramatic peaks in the background. Sunrise/sunset golden hour lighting.",
            ],
            Category::Cafe => &[
                "Place this person at a cozy cafe with warm interior lighting, enjoying coffee. Natural indoor ambient light.",
                "Show this person at a Parisian-style outdoor cafe with elegant atmosphere. Natural daylight with soft shadows.",
                "Create a hygge-inspired coffee shop moment with books and warm lighting. Cozy indoor atmosphere with natural window light.",
            ],
            Category::Sunset => &[
                "Place this person against a stunning golden hour sunset with dramatic orange and pink sky. Natural backlighting.",
                "Show this person at a beach during magical sunset with warm colors reflecting on water. Golden hour photography.",
                "Create a romantic sunset landscape scene with beautiful twilight colors. Natural evening ambient lighting.",
            ],
            Category::Cyberpunk => &[
                "Place this person in a neon-lit cyberpunk city street at night with vibrant purple and blue lights. Night photography with neon reflections.",
                "Show this person in a futuristic urban environment with holographic signs and rain-slicked streets. Dramatic neon lighting.",
                "Create a dystopian city scene with towering buildings and neon advertisements. Moody night atmosphere with colorful artificial lighting.",
            ],
            Category::Studio => &[
                "Place this person in a professional photography studio with clean white background. Soft studio lighting setup.",
                "Show this person with dramatic studio lighting and artistic shadows. Professional portrait photography setup.",
                "Create a fashion photography studio scene with colored gel lights and modern backdrop. Professional lighting arrangement.",
            ],
            Category::Nature => &[
                "Place this person in a lush forest with sunlight filtering through the trees. Natural dappled lighting and green surroundings.",
                "Show this person in a flower field during spring with vibrant colors. Natural daylight and nature photography style.",
                "Create a peaceful lakeside scene with this person enjoying nature. Calm water reflections and natural outdoor lighting.",
            ],
            Category::Retro => &[
                "Place this person in a vintage 1970s-style setting with retro decor and warm color grading. Film photography aesthetic.",
                "Show this person at a classic American diner with neon signs and vintage atmosphere. Nostalgic retro lighting.",
                "Create a vintage Polaroid-style scene with faded colors and retro environment. Classic film camera aesthetic.",
            ],
        }
    }
}

pub fn build_scene_prompt(scene: &str) -> String {
    format!("{PHOTO_RULES}\n\nScene: {scene}")
}

/// What the caller asked for: a catalog category or their own prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSelection {
    Category(String),
    Freeform(String),
}

impl PromptSelection {
    /// The value stored as the record's `category` field.
    pub fn label(&self) -> &str {
        match self {
            PromptSelection::Category(c) | PromptSelection::Freeform(c) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    category: Option<Category>,
    fallback: bool,
    prompts: Vec<String>,
}

impl PromptSet {
    pub fn prompts(&self) -> &[String] { &self.prompts }

    pub fn len(&self) -> usize { self.prompts.len() }

    pub fn is_empty(&self) -> bool { self.prompts.is_empty() }

    /// Catalog category the prompts came from; `None` for a freeform prompt.
    pub fn category(&self) -> Option<Category> { self.category }

    /// True when the requested category was unknown and the default set was used.
    pub fn is_fallback(&self) -> bool { self.fallback }
}

pub fn resolve(selection: &PromptSelection) -> PromptSet {
    match selection {
        PromptSelection::Category(key) => {
            let (category, fallback) = match Category::from_key(key) {
                Some(c) => (c, false),
                None => (Category::DEFAULT, true),
            };
            PromptSet {
                category: Some(category),
                fallback,
                prompts: category.scenes().iter().map(|s| build_scene_prompt(s)).collect(),
            }
        }
        PromptSelection::Freeform(text) => PromptSet { category: None, fallback: false, prompts: vec![text.clone()] },
    }
}
