mod fake_encoder;
mod objective_test;
mod trainer_test;
