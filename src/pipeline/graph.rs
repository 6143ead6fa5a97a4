// ============================================================================
// DEPENDENCY GRAPH — which channel reads which, resolved once per render
// ============================================================================

use crate::channel::{ChannelMap, InputSource, TextureChannel};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// The buffer a channel's render starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// The channel's own source texture.
    Own,
    /// Another channel's source texture.
    Source(TextureChannel),
    /// Another channel's render target (already transformed).
    Output(TextureChannel),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub origin: Origin,
    /// Pixels come from an already-transformed output, so this channel must not
    /// apply seamless tiling or perspective again.
    pub derived_uv: bool,
}

/// Read-only view of every channel's configured input.
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    inputs: ChannelMap<InputSource>,
}

impl DependencyGraph {
    /// Validate the configured inputs.  Material and Grunge can neither read
    /// nor be read; chains of `OutputOf` must not form a cycle.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let inputs = ChannelMap::from_fn(|ch| cfg.channel(ch).input);
        for (ch, input) in inputs.iter() {
            let referenced = match *input {
                InputSource::Own => continue,
                InputSource::SourceOf(c) | InputSource::OutputOf(c) => c,
            };
            if !ch.in_dependency_graph() {
                return Err(PipelineError::InvalidInput(format!(
                    "{} cannot read from another channel",
                    ch
                )));
            }
            if !referenced.in_dependency_graph() {
                return Err(PipelineError::InvalidInput(format!(
                    "{} cannot read from {}",
                    ch, referenced
                )));
            }
        }

        let graph = Self { inputs };
        for ch in TextureChannel::ALL {
            graph.check_acyclic(ch)?;
        }
        Ok(graph)
    }

    fn check_acyclic(&self, start: TextureChannel) -> Result<()> {
        let mut cur = start;
        for _ in 0..TextureChannel::ALL.len() {
            match self.inputs[cur] {
                InputSource::OutputOf(next) => {
                    if next == start {
                        return Err(PipelineError::InvalidInput(format!(
                            "output dependency cycle through {}",
                            start
                        )));
                    }
                    cur = next;
                }
                _ => return Ok(()),
            }
        }
        // A chain longer than the channel count revisits a channel that is not
        // `start`; that loop is reported from its own start.
        Ok(())
    }

    pub fn input(&self, ch: TextureChannel) -> InputSource {
        self.inputs[ch]
    }

    pub fn resolve(&self, ch: TextureChannel) -> Resolved {
        match self.inputs[ch] {
            InputSource::Own => Resolved {
                origin: Origin::Own,
                derived_uv: false,
            },
            InputSource::SourceOf(c) if c == ch => Resolved {
                origin: Origin::Own,
                derived_uv: false,
            },
            InputSource::SourceOf(c) => Resolved {
                origin: Origin::Source(c),
                derived_uv: false,
            },
            InputSource::OutputOf(c) => Resolved {
                origin: Origin::Output(c),
                derived_uv: true,
            },
        }
    }

    /// Every channel that reads `ch` directly or transitively, excluding `ch`.
    pub fn dependents(&self, ch: TextureChannel) -> Vec<TextureChannel> {
        let mut out: Vec<TextureChannel> = Vec::new();
        let mut frontier = vec![ch];
        while let Some(cur) = frontier.pop() {
            for (other, input) in self.inputs.iter() {
                let reads = matches!(*input, InputSource::SourceOf(c) | InputSource::OutputOf(c) if c == cur);
                if reads && other != ch && !out.contains(&other) {
                    out.push(other);
                    frontier.push(other);
                }
            }
        }
        out.sort();
        out
    }

    /// `written` plus all of their dependents, sorted and deduplicated.
    pub fn stale_after(&self, written: &[TextureChannel]) -> Vec<TextureChannel> {
        let mut out: Vec<TextureChannel> = written.to_vec();
        for &ch in written {
            out.extend(self.dependents(ch));
        }
        out.sort();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with(pairs: &[(TextureChannel, InputSource)]) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        for &(ch, input) in pairs {
            cfg.channel_mut(ch).input = input;
        }
        cfg
    }

    #[test]
    fn output_reference_short_circuits_uv() {
        use TextureChannel::*;
        let graph = DependencyGraph::from_config(&cfg_with(&[(Normal, InputSource::OutputOf(Height))])).unwrap();
        let r = graph.resolve(Normal);
        assert_eq!(r.origin, Origin::Output(Height));
        assert!(r.derived_uv);
        assert!(!graph.resolve(Height).derived_uv);
    }

    #[test]
    fn cycles_are_rejected() {
        use TextureChannel::*;
        let cfg = cfg_with(&[
            (Normal, InputSource::OutputOf(Height)),
            (Height, InputSource::OutputOf(Normal)),
        ]);
        assert!(matches!(
            DependencyGraph::from_config(&cfg),
            Err(PipelineError::InvalidInput(_))
        ));
        let self_loop = cfg_with(&[(Specular, InputSource::OutputOf(Specular))]);
        assert!(DependencyGraph::from_config(&self_loop).is_err());
    }

    #[test]
    fn material_and_grunge_stay_outside() {
        use TextureChannel::*;
        assert!(DependencyGraph::from_config(&cfg_with(&[(Grunge, InputSource::SourceOf(Diffuse))])).is_err());
        assert!(DependencyGraph::from_config(&cfg_with(&[(Roughness, InputSource::OutputOf(Material))])).is_err());
    }

    #[test]
    fn dependents_are_transitive() {
        use TextureChannel::*;
        let graph = DependencyGraph::from_config(&cfg_with(&[
            (Normal, InputSource::OutputOf(Height)),
            (Occlusion, InputSource::OutputOf(Normal)),
            (Specular, InputSource::SourceOf(Diffuse)),
        ]))
        .unwrap();
        assert_eq!(graph.dependents(Height), vec![Normal, Occlusion]);
        assert_eq!(graph.stale_after(&[Diffuse]), vec![Diffuse, Specular]);
    }
}
