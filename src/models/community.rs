use rand::seq::SliceRandom;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommunityWork {
    pub id: u32,
    pub image: &'static str,
    pub prompt: &'static str,
}

static COMMUNITY_WORKS: [CommunityWork; 6] = [
    CommunityWork {
        id: 1,
        image: "/images/community/1.png",
        prompt: "A lighthouse on a cliff at dusk, waves crashing below, warm light from the lantern room, cinematic wide shot",
    },
    CommunityWork {
        id: 2,
        image: "/images/community/2.png",
        prompt: "Portrait of an elderly clockmaker in his workshop, brass gears on the bench, soft window light, photorealistic",
    },
    CommunityWork {
        id: 3,
        image: "/images/community/3.png",
        prompt: "A small red fox curled up in fresh snow, pine forest background, shallow depth of field",
    },
    CommunityWork {
        id: 4,
        image: "/images/community/4.png",
        prompt: "Futuristic night market under neon signs, rain-soaked street reflections, crowded stalls, cyberpunk style",
    },
    CommunityWork {
        id: 5,
        image: "/images/community/5.png",
        prompt: "Watercolor illustration of a cottage garden in spring, tulips and climbing roses, pastel palette",
    },
    CommunityWork {
        id: 6,
        image: "/images/community/6.png",
        prompt: "An astronaut sitting on the edge of a crater, Earth rising on the horizon, highly detailed, 8k",
    },
];

pub fn community_works() -> &'static [CommunityWork] {
    &COMMUNITY_WORKS
}

pub fn find(id: u32) -> Option<&'static CommunityWork> {
    COMMUNITY_WORKS.iter().find(|work| work.id == id)
}

pub fn random_prompt() -> Option<&'static str> {
    pick_prompt(community_works())
}

fn pick_prompt(works: &'static [CommunityWork]) -> Option<&'static str> {
    works
        .choose(&mut rand::thread_rng())
        .map(|work| work.prompt)
}
