use crate::constants::*;
use crate::input;
use cursorfx_core::CollisionEvent;
use web_sys as web;

fn create_gain(audio_ctx: &web::AudioContext, value: f32, label: &str) -> Option<web::GainNode> {
    match web::GainNode::new(audio_ctx) {
        Ok(g) => {
            g.gain().set_value(value);
            Some(g)
        }
        Err(e) => {
            log::error!("[audio] {} GainNode error: {:?}", label, e);
            None
        }
    }
}

/// Collision one-shots: a short filtered blip per event, loudness from the
/// event intensity, at most one per `MIN_SOUND_INTERVAL_MS`.
pub struct CollisionSound {
    ctx: web::AudioContext,
    master: web::GainNode,
    last_ms: Option<f64>,
}

impl CollisionSound {
    pub fn new() -> anyhow::Result<Self> {
        let ctx = web::AudioContext::new().map_err(|e| anyhow::anyhow!("AudioContext: {:?}", e))?;
        let master = create_gain(&ctx, 1.0, "master")
            .ok_or_else(|| anyhow::anyhow!("master gain unavailable"))?;
        _ = master.connect_with_audio_node(&ctx.destination());
        Ok(Self {
            ctx,
            master,
            last_ms: None,
        })
    }

    /// Browsers start contexts suspended until a user gesture.
    pub fn resume(&self) {
        _ = self.ctx.resume();
    }

    /// Play the loudest of `events`, if the throttle allows.
    pub fn play(&mut self, events: &[CollisionEvent], viewport_width: f32, now_ms: f64) {
        let Some(ev) = events
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
        else {
            return;
        };
        if ev.intensity < MIN_AUDIBLE_INTENSITY
            || !input::sound_due(self.last_ms, now_ms, MIN_SOUND_INTERVAL_MS)
        {
            return;
        }
        if self.ctx.state() != web::AudioContextState::Running {
            return;
        }
        self.last_ms = Some(now_ms);
        self.trigger_one_shot(ev.intensity, input::pan_for(ev.position, viewport_width));
    }

    fn trigger_one_shot(&self, intensity: f32, pan: f32) {
        let Ok(src) = web::OscillatorNode::new(&self.ctx) else {
            return;
        };
        src.set_type(web::OscillatorType::Triangle);
        src.frequency()
            .set_value(SOUND_BASE_HZ + SOUND_HZ_SPAN * intensity);
        let Ok(tone) = web::BiquadFilterNode::new(&self.ctx) else {
            return;
        };
        tone.set_type(web::BiquadFilterType::Lowpass);
        tone.frequency().set_value(SOUND_LOWPASS_HZ);
        let Some(g) = create_gain(&self.ctx, 0.0, "one-shot") else {
            return;
        };
        let Ok(panner) = web::StereoPannerNode::new(&self.ctx) else {
            return;
        };
        panner.pan().set_value(pan);

        let now = self.ctx.current_time();
        let t0 = now + SOUND_ATTACK_SEC;
        _ = g.gain().set_value_at_time(0.0, now);
        _ = g
            .gain()
            .linear_ramp_to_value_at_time(intensity * VOLUME, t0);
        _ = g
            .gain()
            .exponential_ramp_to_value_at_time(1e-4, t0 + SOUND_DECAY_SEC);
        _ = src.connect_with_audio_node(&tone);
        _ = tone.connect_with_audio_node(&g);
        _ = g.connect_with_audio_node(&panner);
        _ = panner.connect_with_audio_node(&self.master);
        _ = src.start_with_when(now);
        _ = src.stop_with_when(t0 + SOUND_DECAY_SEC + 0.02);
    }

    pub fn close(&self) {
        _ = self.ctx.close();
    }
}
