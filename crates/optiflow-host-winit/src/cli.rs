use std::path::PathBuf;

use optiflow_core::PipelineConfig;

/// Command-line options. Values given here override the JSON config.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub images: Option<PathBuf>,
    pub shaders: Option<PathBuf>,
    pub mesh: Option<PathBuf>,
    pub blur_passes: Option<u32>,
    pub autoplay: bool,
    pub headless: bool,
}

#[derive(Debug, PartialEq)]
pub enum ParseOutcome {
    Run(CliArgs),
    Help,
}

pub fn print_usage_and_exit() -> ! {
    eprintln!(
        "Usage:
  optiflow [--images DIR] [--config FILE.json] [--shaders DIR] [--mesh FILE.obj]
           [--blur-passes N] [--autoplay] [--headless]

Config JSON format (every field optional):
{{
  \"images\": \"./images\",
  \"blur_passes\": 0,
  \"clear_color\": [0.0, 0.0, 0.0, 1.0],
  \"samples\": 4,
  \"thumbnails\": {{ \"x\": 0.8, \"top\": 0.8, \"step\": 0.4, \"scale\": 0.19 }},
  \"autoplay\": false,
  \"shader_dir\": null,
  \"mesh\": null
}}

Controls:
  Right arrow : advance one frame
  Close window: quit

Notes:
- --headless runs the pipeline on the CPU reference device and logs flow statistics.
  It always uses the builtin kernels, so --shaders is rejected there.
- Log level comes from RUST_LOG (default: info).
"
    );
    std::process::exit(2);
}

/// Parses everything after the program name.
pub fn parse_from<I>(args: I) -> Result<ParseOutcome, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut out = CliArgs::default();

    fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String, String> {
        args.next().ok_or_else(|| format!("{flag} needs a value"))
    }

    while let Some(a) = args.next() {
        match a.as_str() {
            "--config" => out.config = Some(value(&mut args, &a)?.into()),
            "--images" => out.images = Some(value(&mut args, &a)?.into()),
            "--shaders" => out.shaders = Some(value(&mut args, &a)?.into()),
            "--mesh" => out.mesh = Some(value(&mut args, &a)?.into()),
            "--blur-passes" => {
                let v = value(&mut args, &a)?;
                let n = v
                    .parse()
                    .map_err(|_| format!("--blur-passes expects a count, got `{v}`"))?;
                out.blur_passes = Some(n);
            }
            "--autoplay" => out.autoplay = true,
            "--headless" => out.headless = true,
            "--help" | "-h" => return Ok(ParseOutcome::Help),
            _ => return Err(format!("Unknown arg: {a}")),
        }
    }
    // The CPU device runs its builtin kernels, not GLSL.
    if out.headless && out.shaders.is_some() {
        return Err("--shaders has no effect with --headless".into());
    }
    Ok(ParseOutcome::Run(out))
}

pub fn parse_args() -> CliArgs {
    match parse_from(std::env::args().skip(1)) {
        Ok(ParseOutcome::Run(args)) => args,
        Ok(ParseOutcome::Help) => print_usage_and_exit(),
        Err(msg) => {
            eprintln!("{msg}");
            print_usage_and_exit();
        }
    }
}

impl CliArgs {
    /// Applies CLI overrides on top of a loaded (or default) config.
    pub fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(dir) = &self.images {
            cfg.images = dir.clone();
        }
        if let Some(dir) = &self.shaders {
            cfg.shader_dir = Some(dir.clone());
        }
        if let Some(mesh) = &self.mesh {
            cfg.mesh = Some(mesh.clone());
        }
        if let Some(n) = self.blur_passes {
            cfg.blur_passes = n;
        }
        if self.autoplay {
            cfg.autoplay = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_args_is_all_defaults() {
        assert_eq!(
            parse_from(args(&[])).unwrap(),
            ParseOutcome::Run(CliArgs::default())
        );
    }

    #[test]
    fn flags_and_values_parse() {
        let ParseOutcome::Run(cli) = parse_from(args(&[
            "--images",
            "frames",
            "--blur-passes",
            "2",
            "--headless",
            "--autoplay",
        ]))
        .unwrap() else {
            panic!("expected Run");
        };
        assert_eq!(cli.images, Some(PathBuf::from("frames")));
        assert_eq!(cli.blur_passes, Some(2));
        assert!(cli.headless && cli.autoplay);
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse_from(args(&["--bogus"])).unwrap_err().contains("Unknown arg"));
        assert!(parse_from(args(&["--images"])).unwrap_err().contains("needs a value"));
        assert!(parse_from(args(&["--blur-passes", "x"])).is_err());
        assert_eq!(parse_from(args(&["-h"])).unwrap(), ParseOutcome::Help);
    }

    #[test]
    fn shader_dir_is_rejected_in_headless_mode() {
        let err = parse_from(args(&["--headless", "--shaders", "glsl"])).unwrap_err();
        assert!(err.contains("--shaders"), "{err}");
        assert!(parse_from(args(&["--shaders", "glsl"])).is_ok());
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut cfg = PipelineConfig::default();
        let cli = CliArgs {
            images: Some("elsewhere".into()),
            blur_passes: Some(3),
            autoplay: true,
            ..CliArgs::default()
        };
        cli.apply(&mut cfg);
        assert_eq!(cfg.images, PathBuf::from("elsewhere"));
        assert_eq!(cfg.blur_passes, 3);
        assert!(cfg.autoplay);
        assert_eq!(cfg.samples, 4);
    }
}
