//! Build pipeline step tables, keyed by project type (spec §4.C step 5; the
//! scripts themselves are a Non-goal — these are the orchestrator's own
//! generic, illustrative steps, not a real build matrix).

use crate::types::ProjectType;

#[derive(Debug, Clone)]
pub struct BuildStep {
    pub log_message: &'static str,
    pub command: &'static str,
    pub inject_env: bool,
}

pub fn steps_for(project_type: ProjectType) -> Vec<BuildStep> {
    let install = BuildStep {
        log_message: "Installing dependencies",
        command: "npm install",
        inject_env: false,
    };
    match project_type {
        ProjectType::Nextjs => vec![
            install,
            BuildStep { log_message: "Building Next.js app", command: "npm run build", inject_env: true },
            BuildStep {
                log_message: "Packaging for the edge runtime",
                command: "npx @opennextjs/cloudflare build",
                inject_env: true,
            },
        ],
        ProjectType::Hugo => vec![BuildStep {
            log_message: "Building Hugo site",
            command: "hugo --minify",
            inject_env: true,
        }],
        ProjectType::Jekyll => vec![
            BuildStep { log_message: "Installing gems", command: "bundle install", inject_env: false },
            BuildStep { log_message: "Building Jekyll site", command: "bundle exec jekyll build", inject_env: true },
        ],
        ProjectType::Eleventy => vec![
            install,
            BuildStep { log_message: "Building Eleventy site", command: "npx @11ty/eleventy", inject_env: true },
        ],
        ProjectType::Astro => vec![
            install,
            BuildStep { log_message: "Building Astro site", command: "npm run build", inject_env: true },
        ],
        ProjectType::PlainHtml => vec![BuildStep {
            log_message: "Packaging static site",
            command: "mkdir -p .static-site/assets && cp -r . .static-site/assets",
            inject_env: false,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_project_type_has_at_least_one_step() {
        for project_type in [
            ProjectType::Nextjs,
            ProjectType::Hugo,
            ProjectType::Jekyll,
            ProjectType::Eleventy,
            ProjectType::Astro,
            ProjectType::PlainHtml,
        ] {
            assert!(!steps_for(project_type).is_empty());
        }
    }
}
