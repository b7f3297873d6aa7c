//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use advice_core::{
    Action, AdviceError, Binding, EntityId, FactStore, Pattern, Planner, PlannerConfig, Relation,
    RuleEngine, SerializableStore, World, WorldSpec, advice_taker_world, commit_plan,
    formats::store_to_bytes,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a world file (10 MB).
const MAX_WORLD_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Read a world file, refusing anything larger than `max_size` bytes.
///
/// An oversized file is reported as `InvalidWorld`: it is readable, but no
/// world within the input limits needs that much text.
fn read_world_file(path: &Path, max_size: u64) -> Result<String, AdviceError> {
    let size = std::fs::metadata(path)
        .map_err(|e| AdviceError::IoError(format!("Cannot read file metadata: {}", e)))?
        .len();
    if size > max_size {
        return Err(AdviceError::InvalidWorld(format!(
            "world file is {} bytes, limit is {} bytes",
            size, max_size
        )));
    }

    std::fs::read_to_string(path)
        .map_err(|e| AdviceError::IoError(format!("Read world file: {}", e)))
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AdviceError> {
    let canonical = path.canonicalize().map_err(|e| {
        AdviceError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(AdviceError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against an existing parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, AdviceError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        AdviceError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(AdviceError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| AdviceError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// WORLD LOADING
// =============================================================================

/// Load a world from a TOML file, or the built-in scenario when no path is
/// given.
pub fn load_world(path: Option<&Path>) -> Result<World, AdviceError> {
    let Some(path) = path else {
        tracing::debug!("using built-in world");
        return advice_taker_world();
    };

    let validated_path = validate_file_path(path)?;
    let text = read_world_file(&validated_path, MAX_WORLD_FILE_SIZE)?;
    let description = parse_world(&text)?;

    tracing::info!(path = %validated_path.display(), "loading world");
    description.build()
}

/// Parse a TOML world description.
pub fn parse_world(text: &str) -> Result<WorldSpec, AdviceError> {
    toml::from_str(text)
        .map_err(|e| AdviceError::SerializationError(format!("Invalid world file: {}", e)))
}

/// Resolve an optional entity name, falling back to `default`.
fn resolve_or(
    store: &FactStore,
    name: Option<&str>,
    default: EntityId,
) -> Result<EntityId, AdviceError> {
    name.map_or(Ok(default), |name| store.resolve(name))
}

fn action_json(store: &FactStore, action: &Action) -> serde_json::Value {
    serde_json::json!({
        "actor": store.name_of(action.actor),
        "from": store.name_of(action.from),
        "to": store.name_of(action.to),
        "mode": action.mode,
        "kind": action.kind,
        "description": action.describe(store),
    })
}

/// Every direct `At` edge as `(subject name, object name)`.
fn locations(store: &FactStore) -> Vec<(String, String)> {
    store
        .facts()
        .filter(|(_, relation, _, _)| *relation == Relation::At)
        .map(|(subject, _, object, _)| (store.name_of(subject), store.name_of(object)))
        .collect()
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show the loaded world.
pub fn cmd_status(world_path: Option<&Path>, json_mode: bool) -> Result<(), AdviceError> {
    let world = load_world(world_path)?;
    let store = &world.store;

    if json_mode {
        print_json(&serde_json::json!({
            "agent": store.name_of(world.agent),
            "goal": store.name_of(world.goal),
            "max_depth": world.max_depth,
            "entity_count": store.entity_count(),
            "fact_count": store.fact_count(),
            "goal_reached": store.holds(world.agent, Relation::At, world.goal),
        }));
        return Ok(());
    }

    println!("Advice Taker World");
    println!("==================");
    println!("Agent:     {}", store.name_of(world.agent));
    println!("Goal:      {}", store.name_of(world.goal));
    println!("Max Depth: {}", world.max_depth);
    println!();
    println!("Entities:  {}", store.entity_count());
    println!("Facts:     {}", store.fact_count());
    println!();
    println!("Locations:");
    for (subject, object) in locations(store) {
        println!("  {} at {}", subject, object);
    }

    Ok(())
}

// =============================================================================
// ACTIONS COMMAND
// =============================================================================

/// List the immediate conclusions for an agent.
pub fn cmd_actions(
    world_path: Option<&Path>,
    json_mode: bool,
    agent: Option<&str>,
) -> Result<(), AdviceError> {
    let world = load_world(world_path)?;
    let agent = resolve_or(&world.store, agent, world.agent)?;
    let actions = RuleEngine::new(agent).candidates(&world.store)?;

    if json_mode {
        let items: Vec<_> = actions
            .iter()
            .map(|action| action_json(&world.store, action))
            .collect();
        print_json(&serde_json::json!({
            "agent": world.store.name_of(agent),
            "actions": items,
        }));
        return Ok(());
    }

    if actions.is_empty() {
        println!("{} cannot do anything", world.store.name_of(agent));
    }
    for action in &actions {
        println!(
            "Immediate Conclusion: {} can go from {} to {} {}",
            world.store.name_of(action.actor),
            world.store.name_of(action.from),
            world.store.name_of(action.to),
            action.mode
        );
    }

    Ok(())
}

// =============================================================================
// PLAN COMMAND
// =============================================================================

/// Options of the `plan` command.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub agent: Option<String>,
    pub goal: Option<String>,
    pub max_depth: Option<usize>,
    pub max_expansions: Option<usize>,
    pub commit: bool,
    pub verbose: bool,
}

/// Search for a plan and print it.
pub fn cmd_plan(
    world_path: Option<&Path>,
    json_mode: bool,
    options: &PlanOptions,
) -> Result<(), AdviceError> {
    let mut world = load_world(world_path)?;
    let agent = resolve_or(&world.store, options.agent.as_deref(), world.agent)?;
    let goal = resolve_or(&world.store, options.goal.as_deref(), world.goal)?;

    let mut config = PlannerConfig::with_max_depth(options.max_depth.unwrap_or(world.max_depth));
    if let Some(budget) = options.max_expansions {
        config = config.max_expansions(budget);
    }

    let planner = Planner::new(&world.store, agent, goal, config)?;
    let plan = planner.search(&world.store)?;
    tracing::info!(
        steps = plan.actions.len(),
        expanded = plan.expanded,
        "plan found"
    );

    if options.commit {
        commit_plan(&mut world.store, &plan.actions)?;
    }
    let store = &world.store;

    if json_mode {
        let steps: Vec<_> = plan
            .actions
            .iter()
            .map(|action| action_json(store, action))
            .collect();
        let mut output = serde_json::json!({
            "agent": store.name_of(agent),
            "goal": store.name_of(goal),
            "steps": steps,
            "expanded": plan.expanded,
            "generated": plan.generated,
            "committed": options.commit,
        });
        if options.commit
            && let Some(map) = output.as_object_mut()
        {
            let located: Vec<_> = locations(store)
                .into_iter()
                .map(|(subject, object)| serde_json::json!({"subject": subject, "object": object}))
                .collect();
            map.insert("locations".to_string(), serde_json::Value::from(located));
        }
        print_json(&output);
        return Ok(());
    }

    if plan.actions.is_empty() {
        println!(
            "{} is already at {}",
            store.name_of(agent),
            store.name_of(goal)
        );
    }
    for (step, action) in plan.actions.iter().enumerate() {
        println!("{}. {}", step.saturating_add(1), action.describe(store));
    }
    if options.verbose {
        println!();
        println!("Expanded:  {}", plan.expanded);
        println!("Generated: {}", plan.generated);
    }
    if options.commit {
        println!();
        println!("Committed {} steps. Locations:", plan.actions.len());
        for (subject, object) in locations(store) {
            println!("  {} at {}", subject, object);
        }
    }

    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Evaluate a textual pattern and print every solution.
pub fn cmd_query(
    world_path: Option<&Path>,
    json_mode: bool,
    pattern: &str,
) -> Result<(), AdviceError> {
    let world = load_world(world_path)?;
    let store = &world.store;
    let pattern = Pattern::parse(store, pattern)?;

    let solutions: Vec<Vec<(String, String)>> = store
        .query(&pattern)?
        .map(|bindings| {
            bindings
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        Binding::Entity(id) => store.name_of(id),
                        Binding::Relation(relation) => relation.name().to_string(),
                    };
                    (name.to_string(), value)
                })
                .collect()
        })
        .collect();

    if json_mode {
        let items: Vec<serde_json::Value> = solutions
            .iter()
            .map(|solution| {
                solution
                    .iter()
                    .map(|(name, value)| (name.clone(), serde_json::Value::from(value.as_str())))
                    .collect::<serde_json::Map<_, _>>()
                    .into()
            })
            .collect();
        print_json(&serde_json::json!({
            "pattern": pattern.to_string(),
            "solutions": items,
        }));
        return Ok(());
    }

    if solutions.is_empty() {
        println!("No solutions for {}", pattern);
    }
    for solution in &solutions {
        let rendered: Vec<_> = solution
            .iter()
            .map(|(name, value)| format!("?{} = {}", name, value))
            .collect();
        if rendered.is_empty() {
            println!("true");
        } else {
            println!("{}", rendered.join(", "));
        }
    }

    Ok(())
}

// =============================================================================
// DUMP COMMAND
// =============================================================================

/// Dump the world state as JSON or as a binary snapshot.
pub fn cmd_dump(
    world_path: Option<&Path>,
    output: Option<&Path>,
    format: &str,
) -> Result<(), AdviceError> {
    let world = load_world(world_path)?;

    let data = match format {
        "json" => serde_json::to_vec_pretty(&SerializableStore::from(&world.store))
            .map_err(|e| AdviceError::SerializationError(e.to_string()))?,
        "binary" => store_to_bytes(&world.store)?,
        _ => {
            return Err(AdviceError::SerializationError(format!(
                "Unknown format: {}. Use: json, binary",
                format
            )));
        }
    };

    let Some(output) = output else {
        if format == "binary" {
            return Err(AdviceError::IoError(
                "Binary dumps need an output file (--output)".to_string(),
            ));
        }
        println!("{}", String::from_utf8_lossy(&data));
        return Ok(());
    };

    let validated_output = validate_output_path(output)?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| AdviceError::IoError(format!("Write file: {}", e)))?;

    println!("Dumped {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write the built-in world as a TOML file.
pub fn cmd_init(output: &Path, force: bool) -> Result<(), AdviceError> {
    if output.exists() && !force {
        return Err(AdviceError::IoError(
            "World file already exists. Use --force to overwrite.".to_string(),
        ));
    }
    let validated_output = validate_output_path(output)?;

    let text = toml::to_string_pretty(&WorldSpec::advice_taker())
        .map_err(|e| AdviceError::SerializationError(e.to_string()))?;
    std::fs::write(&validated_output, text)
        .map_err(|e| AdviceError::IoError(format!("Write file: {}", e)))?;

    println!("Wrote built-in world to {:?}", validated_output);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
