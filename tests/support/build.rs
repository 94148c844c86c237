use evocore::genome::Genome;
use evocore::population::{Individual, Population};

#[allow(dead_code)]
pub fn genome(bytes: &[u8]) -> Genome {
    Genome::from_bytes(bytes)
}

#[allow(dead_code)]
pub fn individual(bytes: &[u8], fitness: Option<f64>) -> Individual {
    Individual {
        genome: Genome::from_bytes(bytes),
        fitness,
        age: 0,
    }
}

#[allow(dead_code)]
pub fn population(data: Vec<(Vec<u8>, Option<f64>)>) -> Population {
    population_with_capacity(data.len(), data)
}

#[allow(dead_code)]
pub fn population_with_capacity(
    capacity: usize,
    data: Vec<(Vec<u8>, Option<f64>)>,
) -> Population {
    let mut population = Population::new(capacity);
    for (bytes, fitness) in data {
        population
            .push(individual(&bytes, fitness))
            .expect("population capacity too small for test data");
    }
    population
}
